use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::{Error, ErrorKind},
};

/// `page` / `limit` query parameters, `page` being 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, Error> {
        let mut query = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "page" => {
                    query.page = value
                        .parse::<i64>()
                        .ok()
                        .filter(|page| *page >= 1)
                        .ok_or_else(|| ErrorKind::NotFound.new("Invalid page."))?;
                }
                "limit" => {
                    query.limit = match value.parse::<i64>() {
                        Ok(limit) if limit > 0 => limit.min(MAX_PAGE_SIZE),
                        _ => DEFAULT_PAGE_SIZE,
                    };
                }
                _ => {}
            }
        }

        // the offset must fit a BIGINT
        (query.page - 1)
            .checked_mul(query.limit)
            .ok_or_else(|| ErrorKind::NotFound.new("Invalid page."))?;

        Ok(query)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Request path and query used to build `next` / `previous` links.
#[derive(Debug, Clone)]
pub struct PageLink {
    path: String,
    pairs: Vec<(String, String)>,
}

impl PageLink {
    pub fn new(path: &str, pairs: &[(String, String)]) -> Self {
        Self {
            path: path.to_string(),
            pairs: pairs
                .iter()
                .filter(|(key, _)| key != "page")
                .cloned()
                .collect(),
        }
    }

    fn to_page(&self, page: i64) -> Option<String> {
        let mut pairs = self.pairs.clone();
        if page > 1 {
            pairs.push((String::from("page"), page.to_string()));
        }

        let query = serde_urlencoded::to_string(&pairs).ok()?;
        if query.is_empty() {
            Some(self.path.clone())
        } else {
            Some(format!("{}?{}", self.path, query))
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        query: &PageQuery,
        link: &PageLink,
    ) -> Result<Self, Error> {
        if rows.is_empty() {
            if query.page > 1 {
                return Err(ErrorKind::NotFound.new("Invalid page."));
            }
            return Ok(Self::no_rows());
        }

        let next = if query.offset() + (rows.len() as i64) < total_rows {
            link.to_page(query.page + 1)
        } else {
            None
        };
        let previous = if query.page > 1 {
            link.to_page(query.page - 1)
        } else {
            None
        };

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
