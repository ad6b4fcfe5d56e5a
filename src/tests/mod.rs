// Tests module
// Scenarios: cycle complet message -> EndBlock sur un store en mémoire
// Lifecycle: gel, redélégations, files d'attente, slash, jail/unjail, genèse
// Properties: propriétés proptest sur les parts et les tokens

pub mod lifecycle;
pub mod scenarios;
