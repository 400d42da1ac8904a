pub mod client;
pub mod errors;
pub mod types;

pub use client::ApiClient;
pub use errors::ApiError;
pub use types::{
    ApiResponse, DirectoryUser, UserInvitation, UserPage, UserProfileUpdate,
    UserRegistrationRequest,
};
