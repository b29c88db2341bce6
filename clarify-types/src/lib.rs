// Types shared between the clarify server, its MCP tool surface, and clients

pub mod api;
pub mod question;
pub mod session;

pub use api::{
    AnswerRequest, AnswerResponse, GenerateRequest, GenerateResponse, HealthResponse,
    SessionListResponse, SessionSummary, StreamComplete, StreamError, StreamStart,
};
pub use question::{Question, QuestionCategory};
pub use session::{Progress, Session, TaskContext};
