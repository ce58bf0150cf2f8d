#[path = "property/classification_totality.rs"]
mod classification_totality;

#[path = "property/replay_agreement.rs"]
mod replay_agreement;
