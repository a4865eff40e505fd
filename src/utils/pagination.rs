use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::errors::ServiceError;

const INVALID_PAGE: &str = "Invalid page.";

/// Page-number pagination request, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Parses the raw `page` query value. A missing value means the first page.
    pub fn parse(raw: Option<&str>, page_size: u32) -> Result<Self, ServiceError> {
        let page = match raw.map(str::trim) {
            None | Some("") => 1,
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| ServiceError::NotFound(INVALID_PAGE.to_string()))?,
        };

        if page == 0 {
            return Err(ServiceError::NotFound(INVALID_PAGE.to_string()));
        }

        Ok(PageRequest {
            page,
            page_size: page_size.max(1),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one page of results. The first page may be empty, later ones may not.
    pub fn new(results: Vec<T>, count: i64, request: PageRequest) -> Result<Self, ServiceError> {
        if request.page > 1 && request.offset() >= count {
            return Err(ServiceError::NotFound(INVALID_PAGE.to_string()));
        }

        let has_next = request.offset() + (results.len() as i64) < count;

        Ok(Page {
            count,
            page: request.page,
            next: has_next.then(|| request.page + 1),
            previous: (request.page > 1).then(|| request.page - 1),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let request = PageRequest::parse(None, 10).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.offset(), 0);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(matches!(PageRequest::parse(Some("0"), 10), Err(ServiceError::NotFound(_))));
        assert!(matches!(PageRequest::parse(Some("last"), 10), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn links_neighbouring_pages() {
        let request = PageRequest::parse(Some("2"), 2).unwrap();
        let page = Page::new(vec![3, 4], 5, request).unwrap();
        assert_eq!(page.previous, Some(1));
        assert_eq!(page.next, Some(3));
    }

    #[test]
    fn empty_first_page_is_allowed_but_overflow_is_not() {
        let first = PageRequest::parse(Some("1"), 10).unwrap();
        let page = Page::<i32>::new(vec![], 0, first).unwrap();
        assert_eq!(page.next, None);

        let third = PageRequest::parse(Some("3"), 10).unwrap();
        assert!(Page::<i32>::new(vec![], 15, third).is_err());
    }
}
