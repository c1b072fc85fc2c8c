use clap::{Args, Parser, Subcommand};
use credit_risk::config::AppConfig;
use credit_risk::error::AppError;
use credit_risk::risk::{
    import_german_csv, load_path, synthetic_records, write_json, Checking, DatasetSummary,
    DirectoryStore, EpochReport, Housing, MemoryStore, Purpose, Record,
    RiskSession, Savings, Sex, TrainingConfig,
};
use credit_risk::telemetry;
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "credit-risk",
    about = "Train and query a credit-risk classifier from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on a JSON or German credit CSV dataset and store the model
    Train(TrainArgs),
    /// Assess one applicant with the stored model, or the rules when none exists
    Predict(PredictArgs),
    /// Print the metrics of the last successful training run
    Metrics,
    /// Summarise a dataset per risk level
    Stats(DatasetArgs),
    /// Convert the raw German credit CSV into labelled JSON records
    Import(ImportArgs),
    /// Train on synthetic data in memory and score two reference applicants
    Demo(DemoArgs),
    /// Remove the stored model and metrics
    Reset,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Dataset path (.csv for the raw German credit export, anything else as JSON)
    #[arg(long)]
    dataset: PathBuf,
    /// Override the number of epochs
    #[arg(long)]
    epochs: Option<usize>,
}

#[derive(Args, Debug)]
struct DatasetArgs {
    #[arg(long)]
    dataset: PathBuf,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long)]
    csv: PathBuf,
    #[arg(long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct DemoArgs {
    #[arg(long, default_value_t = 1000)]
    records: usize,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Full record as JSON; replaces the individual field flags
    #[arg(long, conflicts_with_all = ["age", "sex", "job_level", "housing", "savings", "checking", "credit_amount", "duration_months", "purpose"])]
    record: Option<String>,
    #[arg(long)]
    age: Option<i64>,
    #[arg(long)]
    sex: Option<Sex>,
    /// 0 = unskilled non-resident, 3 = highly skilled
    #[arg(long)]
    job_level: Option<i64>,
    #[arg(long)]
    housing: Option<Housing>,
    #[arg(long)]
    savings: Option<Savings>,
    #[arg(long)]
    checking: Option<Checking>,
    #[arg(long)]
    credit_amount: Option<i64>,
    #[arg(long)]
    duration_months: Option<i64>,
    #[arg(long)]
    purpose: Option<Purpose>,
    /// Skip the model and score with the rules only
    #[arg(long)]
    rules_only: bool,
}

impl PredictArgs {
    fn into_record(self) -> Result<Record, AppError> {
        if let Some(raw) = self.record {
            return Ok(serde_json::from_str(&raw)?);
        }
        let defaults = Record::default();
        Ok(Record {
            age: self.age.unwrap_or(defaults.age),
            sex: self.sex.unwrap_or(defaults.sex),
            job_level: self.job_level.unwrap_or(defaults.job_level),
            housing: self.housing.unwrap_or(defaults.housing),
            savings: self.savings.unwrap_or(defaults.savings),
            checking: self.checking.unwrap_or(defaults.checking),
            credit_amount: self.credit_amount.unwrap_or(defaults.credit_amount),
            duration_months: self.duration_months.unwrap_or(defaults.duration_months),
            purpose: self.purpose.unwrap_or(defaults.purpose),
            risk_label: None,
        })
    }
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    match cli.command {
        Command::Train(args) => run_train(&config, args),
        Command::Predict(args) => run_predict(&config, args),
        Command::Metrics => run_metrics(&config),
        Command::Stats(args) => {
            let records = load_path(&args.dataset)?;
            print_json(&DatasetSummary::from_records(&records))
        }
        Command::Import(args) => run_import(args),
        Command::Demo(args) => run_demo(&config, args),
        Command::Reset => {
            session(&config)?.reset()?;
            print_json(&json!({ "status": "cleared" }))
        }
    }
}

fn training_config(config: &AppConfig) -> TrainingConfig {
    TrainingConfig {
        seed: config.training.seed,
        scaler_fit: config.training.scaler_fit,
        ..TrainingConfig::default()
    }
}

fn session(config: &AppConfig) -> Result<RiskSession<DirectoryStore>, AppError> {
    let store = DirectoryStore::open(&config.storage.directory)?;
    Ok(RiskSession::new(Arc::new(store), training_config(config)))
}

fn run_train(config: &AppConfig, args: TrainArgs) -> Result<(), AppError> {
    let records = load_path(&args.dataset)?;
    let mut training = training_config(config);
    if let Some(epochs) = args.epochs {
        training.fit.epochs = epochs;
    }
    let store = DirectoryStore::open(&config.storage.directory)?;
    let session = RiskSession::new(Arc::new(store), training);

    info!(dataset = %args.dataset.display(), records = records.len(), "loaded dataset");
    let metrics = session.train(&records, &mut log_progress)?;
    print_json(&metrics)
}

fn log_progress(report: &EpochReport) -> ControlFlow<()> {
    info!(
        epoch = report.epoch + 1,
        total = report.total_epochs,
        loss = report.loss,
        accuracy = report.accuracy,
        val_loss = ?report.val_loss,
        val_accuracy = ?report.val_accuracy,
        "epoch complete"
    );
    ControlFlow::Continue(())
}

fn run_predict(config: &AppConfig, args: PredictArgs) -> Result<(), AppError> {
    let rules_only = args.rules_only;
    let record = args.into_record()?;
    let session = session(config)?;
    let prediction = if rules_only {
        session.predict_with_rules(&record)
    } else {
        session.predict(&record)
    };
    print_json(&prediction)
}

fn run_metrics(config: &AppConfig) -> Result<(), AppError> {
    match session(config)?.metrics()? {
        Some(metrics) => print_json(&metrics),
        None => print_json(&json!({ "status": "no trained model yet" })),
    }
}

fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let reader = BufReader::new(File::open(&args.csv)?);
    let records = import_german_csv(reader)?;
    let mut writer = BufWriter::new(File::create(&args.output)?);
    write_json(&mut writer, &records)?;
    writer.flush()?;
    info!(records = records.len(), output = %args.output.display(), "dataset imported");
    print_json(&DatasetSummary::from_records(&records))
}

fn run_demo(config: &AppConfig, args: DemoArgs) -> Result<(), AppError> {
    let seed = config.training.seed.unwrap_or(42);
    let records = synthetic_records(args.records, seed);
    let session = RiskSession::new(Arc::new(MemoryStore::new()), training_config(config));
    let metrics = session.train(&records, &mut log_progress)?;

    let young_renter = Record {
        age: 22,
        sex: Sex::Male,
        job_level: 0,
        housing: Housing::Rent,
        savings: Savings::Little,
        checking: Checking::Little,
        credit_amount: 8000,
        duration_months: 48,
        purpose: Purpose::Car,
        risk_label: None,
    };
    let established_owner = Record {
        age: 40,
        sex: Sex::Female,
        job_level: 3,
        housing: Housing::Own,
        savings: Savings::Rich,
        checking: Checking::Rich,
        credit_amount: 2000,
        duration_months: 12,
        purpose: Purpose::RadioTv,
        risk_label: None,
    };

    print_json(&json!({
        "dataset": DatasetSummary::from_records(&records),
        "metrics": metrics,
        "stored_keys": session.store().keys(),
        "young_renter": {
            "model": session.predict(&young_renter),
            "rules": session.predict_with_rules(&young_renter),
        },
        "established_owner": {
            "model": session.predict(&established_owner),
            "rules": session.predict_with_rules(&established_owner),
        },
    }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
