//! Rendering and export of result payloads

pub mod classify;
pub mod export;
pub mod render;
pub mod text_tables;

pub use classify::{classify, Shape};
pub use export::{ExportError, ExportFormat, ExportedFile, Exporter};
pub use render::{Card, CardBody, OutputRenderer, OutputView, RenderFallback, RenderedOutput, ViewMode};
pub use text_tables::{parse_text_tables, TextBlock};
