// src/core/mod.rs
//! Storage, HTTP clients and rendering services shared by the server and the CLI

pub mod ai_client;
pub mod database;
pub mod pdf_renderer;
pub mod prompts;
pub mod service_client;

pub use ai_client::{AiClient, ChatMessage, DeltaStream};
pub use database::{
    ArticleRepository, CardRepository, Database, ExperienceRepository, JdRepository,
};
pub use pdf_renderer::{PdfRenderer, RenderError, MAX_PDF_BYTES};
pub use service_client::ServiceClient;
