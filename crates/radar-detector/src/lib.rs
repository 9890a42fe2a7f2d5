/*!
 * Radar Detector
 *
 * Agregação de transferências por contrato, pontuação de confiança com
 * heurísticas anti-sybil e escalonamento de alertas para tokens não listados.
 */

mod config;
mod analyzer;
mod buffer;
mod escalator;
mod pipeline;
mod watcher;
mod orchestrator;
mod persistence;
pub mod decode;

pub use config::*;
pub use analyzer::*;
pub use buffer::*;
pub use escalator::*;
pub use pipeline::*;
pub use watcher::*;
pub use orchestrator::*;
pub use persistence::*;
