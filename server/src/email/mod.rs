pub mod body;
pub mod client;
pub mod envelope;
pub mod parsed_message;
pub mod processor;
pub mod rules;
