//! Playbook storage backends.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqlitePlaybookStore`] | Durable single-node storage |
//! | [`InMemoryPlaybookStore`] | Tests and ephemeral runs |

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryPlaybookStore;
pub use sqlite::SqlitePlaybookStore;
pub use traits::PlaybookStore;

use crate::models::{
    GetPlaybooksResults, Playbook, PlaybookFilterOptions, RequesterInfo, SortDirection, SortField,
};
use std::cmp::Ordering;

/// Whether the requester may see the playbook in a team listing.
pub(crate) fn visible_to(playbook: &Playbook, requester: &RequesterInfo) -> bool {
    requester.is_admin || playbook.member_ids.iter().any(|m| m == &requester.user_id)
}

/// Sorts the visible playbooks and cuts out the requested page.
pub(crate) fn sort_and_page(
    mut items: Vec<Playbook>,
    options: PlaybookFilterOptions,
) -> GetPlaybooksResults {
    items.sort_by(|a, b| {
        let ord = match options.sort {
            SortField::Title => a.title.cmp(&b.title),
            SortField::Stages => a.num_stages().cmp(&b.num_stages()),
            SortField::Steps => a.num_steps().cmp(&b.num_steps()),
            SortField::Created => a.create_at.cmp(&b.create_at),
        };
        let ord: Ordering = ord.then_with(|| a.id.cmp(&b.id));
        match options.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    let total_count = items.len();
    if options.per_page == 0 {
        return GetPlaybooksResults {
            total_count,
            page_count: usize::from(total_count > 0),
            has_more: false,
            items,
        };
    }

    let page_count = total_count.div_ceil(options.per_page);
    let items: Vec<Playbook> = items
        .into_iter()
        .skip(options.page.saturating_mul(options.per_page))
        .take(options.per_page)
        .collect();

    GetPlaybooksResults {
        total_count,
        page_count,
        has_more: options.page + 1 < page_count,
        items,
    }
}
