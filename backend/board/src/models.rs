use chrono::{DateTime, Utc};

use crate::{
    error::{BoardError, Result},
    ranking::Scored,
};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

pub const LEGGY_ID_PREFIX: &str = "lggy_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leggy {
    pub id: String,
    pub index: u64,
    pub user_id: String,
    pub message_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLeggy {
    pub user_id: String,
    pub message_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered { leggy: Leggy, user_total: u64 },
    Duplicate { index: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTotal {
    pub user_id: String,
    pub total: u64,
}

impl Scored for UserTotal {
    fn total(&self) -> u64 {
        self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordProfile {
    pub id: String,
    pub display_name: String,
    pub avatar_url: String,
}

/// Offset pagination, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < 1 {
            return Err(BoardError::InvalidInput("page must be >= 1".to_string()));
        }

        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(BoardError::InvalidInput(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    pub fn limit(&self) -> usize {
        self.limit as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

pub fn new_leggy_id() -> String {
    format!("{LEGGY_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Sorts totals highest first, breaking ties by user id so output is stable.
pub fn sort_totals(totals: &mut [UserTotal]) {
    totals.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}
