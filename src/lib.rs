pub mod asr;
pub mod cache;
pub mod colors;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod page;
pub mod resolver;
pub mod setup;
pub mod transport;

pub use crate::error::{BootstrapError, Result};
pub use crate::models::{ActiveSolution, GeoLocation, Solution, SolutionConfig};
pub use crate::resolver::{ConfigResolver, ResolveEnv};
pub use crate::setup::{BootstrapContext, Setup, WidgetSettings};
