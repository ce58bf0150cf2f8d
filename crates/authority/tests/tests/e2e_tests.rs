#[path = "e2e/valid_chain.rs"]
mod valid_chain;

#[path = "e2e/provenance_forgery.rs"]
mod provenance_forgery;

#[path = "e2e/flood_resilience.rs"]
mod flood_resilience;

#[path = "e2e/law_and_restart.rs"]
mod law_and_restart;
