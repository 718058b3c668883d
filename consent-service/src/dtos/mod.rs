pub mod consent;
pub mod embed;
pub mod share;
pub mod tag;

pub use consent::{
    GrantConsentRequest, RecordViewRequest, RecordViewResponse, RevokeAllConsentRequest,
    RevokeAllResponse, RevokeConsentRequest, RevokeResponse, StatusQuery, UpdateConsentRequest,
};
pub use embed::{EmbedQuery, IssueEmbedTokenRequest, SetSyndicationRequest};
pub use share::{IssueShareTokenRequest, ListShareTokensQuery};
pub use tag::{FaceTagResponse, ProposeTagRequest, RemoveTagRequest, RespondTagRequest};
