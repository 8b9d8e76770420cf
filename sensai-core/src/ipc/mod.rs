//! Event types pushed to the UI collaborator.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them over whatever transport it renders with (JSON lines on
//! stdout in the headless app).

pub mod events;
