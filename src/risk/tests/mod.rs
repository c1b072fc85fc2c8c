mod common;
mod encoding;
mod network;
mod prediction;
mod rules;
mod scaler;
