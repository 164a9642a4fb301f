use serde::Deserialize;

/// Which posts a listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    All,
    Group(String),
    Author(String),
    /// Posts by every author the given user id follows.
    FollowedBy(String),
}

/// `?page=` as sent by the browser. Kept as a string so junk input falls back
/// to the first page instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested page number. Missing or non-numeric input means page 1;
    /// anything numeric below 1 maps to 0, which always yields an empty page.
    pub fn number(&self) -> u32 {
        match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n < 1 => 0,
                Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
                Err(_) => 1,
            },
        }
    }
}

/// One slice of an ordered result set.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub number: u32,
    pub items: Vec<T>,
    pub total: u64,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn empty(number: u32, total: u64, page_size: u32) -> Self {
        Self {
            number,
            items: Vec::new(),
            total,
            page_size,
        }
    }

    /// Row offset for `number`, or `None` when the page cannot hold anything.
    pub fn offset(number: u32, total: u64, page_size: u32) -> Option<u64> {
        if number == 0 || page_size == 0 {
            return None;
        }
        let offset = u64::from(number - 1) * u64::from(page_size);
        if offset >= total {
            return None;
        }
        Some(offset)
    }

    /// Always at least 1, so an empty listing still has a first page.
    pub fn num_pages(&self) -> u32 {
        if self.total == 0 || self.page_size == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1 && self.number <= self.num_pages()
    }

    pub fn has_next(&self) -> bool {
        self.number >= 1 && self.number < self.num_pages()
    }

    pub fn previous_number(&self) -> u32 {
        self.number.saturating_sub(1)
    }

    pub fn next_number(&self) -> u32 {
        self.number.saturating_add(1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
