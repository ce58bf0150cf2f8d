#[path = "adversarial/tamper_log.rs"]
mod tamper_log;

#[path = "adversarial/hostile_agent.rs"]
mod hostile_agent;

#[path = "adversarial/hostile_destination.rs"]
mod hostile_destination;
