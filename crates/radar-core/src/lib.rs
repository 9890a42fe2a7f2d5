/*!
 * Radar Core
 *
 * Tipos, traits e utilitários compartilhados entre os crates do listing-radar
 */

pub mod types;
pub mod traits;
pub mod utils;
pub mod error;

// Re-exportações públicas
pub use error::Error;
pub use types::*;
