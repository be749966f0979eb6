pub mod domain;
pub mod ports;

pub use domain::{
    AssuranceLevel, AuthEvent, Book, FactorList, FactorStatus, FactorType, MfaChallenge,
    MfaFactor, NewAccount, ReadingLevel, Recommendation, Session, TotpEnrollment, User,
    UserProfile, ValidationError, VerificationCode,
};
pub use ports::{AuthEventStream, AuthService, LibraryService, PortError, PortResult};
