use serde::{Deserialize, Serialize};

/// Paginated page in the shape the portal UI consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub total_pages: u64,
    pub total_elements: u64,
}

impl<T> PageResponse<T> {
    pub fn new(content: Vec<T>, page: u32, size: u32, total_elements: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size as u64)
        };

        Self {
            content,
            page,
            total_pages,
            total_elements,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(0)
    }

    /// Page size, clamped so a single request cannot drain the store.
    pub fn size(&self) -> u32 {
        self.size.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> u32 {
        self.page() * self.size()
    }
}
