//! An ambient field of drifting particles for your terminal.
//!
//! Points wander the screen with wrap-around edges, nearby pairs are joined by faint lines and
//! the mouse pushes everything out of its way. The particle population adapts to the surface
//! area and the device's memory, and the whole thing politely refuses to animate when the
//! reduced-motion preference is set.
//!
//! The simulation core ([`field::simulation::ParticleField`]) is synchronous and only knows
//! about the [`surface::Canvas`] trait, so it can be driven and observed without a terminal.
//! The binary wires it to a real TTY with half-block "pixels".

pub mod cli_args;
pub mod config;
pub mod environment;
pub mod input;
pub mod particle;
pub mod run;
pub mod surface;
pub mod utils;

/// The particle field itself: the simulation and the loop that drives it.
pub mod field {
    pub mod main;
    pub mod simulation;
}
