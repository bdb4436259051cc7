//! Behavioural tests for the supervisor core.

mod lifecycle_behaviour;
mod roster_behaviour;
mod support;
