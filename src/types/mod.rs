// src/types/mod.rs
//! Shared data types for JD tracking, experiences, personal info and reading cards

pub mod card;
pub mod experience;
pub mod jd;
pub mod module;
pub mod personal_info;
pub mod response;

pub use card::{
    AnalysisMode, Article, Card, CardKind, NewCard, OffsetRange, QueryType, SmartAnalysisRequest,
};
pub use experience::{
    get_end_year, select_starred, sort_by_end_year_desc, CreateExperienceRequest, ExperienceRecord,
};
pub use jd::{CreateJdRequest, FieldValue, JdField, JdRecord};
pub use module::{
    CoverLetterPdfRequest, CoverLetterRequest, ExperienceModule, GeneratePdfRequest, JdInfo,
    ResumeV2Request, SourceIds,
};
pub use personal_info::{PageFormat, PdfConfig, PersonalInfo};
pub use response::{ApiResponse, CoverLetter, JdAnalysis, OptimizedExperience, StageOptionsResponse};
