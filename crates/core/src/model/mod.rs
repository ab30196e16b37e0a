mod course;
mod exam;
mod history;
mod ids;
mod question;
mod session;

pub use ids::{CourseId, ExamResultId, ParseIdError, QuestionId, UserId};

pub use course::{Course, CourseError, User, UserRole};
pub use exam::{ExamAnswer, ExamResult};
pub use history::History;
pub use question::{
    Answer, AnswerWeight, ParseSourceError, Question, QuestionError, Source, validate_content,
};
pub use session::{ExamProgress, ExamSession, ExamSessionError};
