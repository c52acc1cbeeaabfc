//! # ldar-io: parameter and input handling
//!
//! The input side of the simulator: layered parameter files
//! (global / program / method with defaults, warnings and fatal type
//! checks), CSV input tables, the prepared binary weather grid, and the
//! fingerprinted world cache for pre-generated leak realisations.

pub mod cache;
pub mod defaults;
pub mod inputs;
pub mod manager;

pub use cache::{compute_fingerprint, load_world, prepare_generator_dir, store_world};
pub use inputs::{load_program_inputs, FacilityRow, ProgramInputs, SubtypeDistRow};
pub use manager::{read_and_validate_parameters, read_parameter_file, write_resolved_parameters};
