//! Data models for playbook-signal.

mod events;
mod playbook;
mod post;
mod suggestion;

pub use events::{EventMeta, SignalEvent};
pub use playbook::{
    CachedPlaybook, Checklist, ChecklistItem, GetPlaybooksResults, Playbook, PlaybookFilterOptions,
    PlaybookId, RequesterInfo, SortDirection, SortField,
};
pub use post::{Channel, Post, SYSTEM_POST_TYPE_PREFIX, Session};
pub use suggestion::{
    ActionIntegration, ActionOption, ActionType, PostAction, Suggestion, SuggestionAttachment,
    SuggestionPost,
};
