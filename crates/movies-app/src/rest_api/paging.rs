use garde::Validate;
use movies_dal::{Batch, ListingParams, Order};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

const MAX_ORDERING_NAME: usize = 100;

#[derive(Debug, Clone, Default, Validate, serde::Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct Paging {
    /// Page number, starting from 1
    #[garde(range(min = 1))]
    page: Option<u32>,
    #[garde(range(min = 1, max = 1000))]
    page_size: Option<u32>,
    /// Comma separated field names, prefix `-` for descending order
    #[garde(length(max = 255))]
    sort: Option<String>,
}

impl Paging {
    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(default_page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);
        let order = self.sort.map(parse_ordering).transpose()?;

        Ok(ListingParams {
            offset,
            limit: page_size.into(),
            order,
        })
    }

    pub fn page_size(&self, default_page_size: u32) -> u32 {
        self.page_size.unwrap_or(default_page_size)
    }
}

fn parse_ordering(orderings: String) -> ApiResult<Vec<Order>> {
    orderings
        .split(',')
        .map(|name| {
            let (field_name, descending) = match name.trim() {
                "" => return Err(ApiError::InvalidQuery("Empty ordering name".to_string())),
                name if name.len() > MAX_ORDERING_NAME => {
                    return Err(ApiError::InvalidQuery("Ordering name too long".to_string()))
                }
                name if name.starts_with('+') => (&name[1..], false),
                name if name.starts_with('-') => (&name[1..], true),
                name => (name, false),
            };

            let order = if descending {
                Order::Desc(field_name.to_string())
            } else {
                Order::Asc(field_name.to_string())
            };

            Ok(order)
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page<T> {
    page: u32,
    page_size: u32,
    total_pages: u32,
    total: u64,
    rows: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn try_from_batch(
        batch: Batch<T>,
        page_size: u32,
    ) -> Result<Self, std::num::TryFromIntError> {
        let page_size_wide = u64::from(page_size.max(1));
        Ok(Self {
            page: u32::try_from(u64::try_from(batch.offset)? / page_size_wide + 1)?,
            page_size,
            total_pages: u32::try_from(batch.total.div_ceil(page_size_wide))?,
            total: batch.total,
            rows: batch.rows,
        })
    }

    pub fn from_batch(batch: Batch<T>, page_size: u32) -> ApiResult<Self> {
        Self::try_from_batch(batch, page_size)
            .map_err(|e| ApiError::InternalError(format!("Invalid page numbers: {e}")))
    }

    /// Converts rows, keeping paging numbers
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            total: self.total,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_params() {
        let paging = Paging {
            page: Some(3),
            page_size: Some(20),
            sort: Some("title, -year_of_release".to_string()),
        };
        let params = paging.into_listing_params(100).unwrap();
        assert_eq!(params.offset, 40);
        assert_eq!(params.limit, 20);
        let order = params.order.unwrap();
        assert!(matches!(&order[0], Order::Asc(f) if f == "title"));
        assert!(matches!(&order[1], Order::Desc(f) if f == "year_of_release"));

        let params = Paging::default().into_listing_params(50).unwrap();
        assert_eq!(params.offset, 0);
        assert_eq!(params.limit, 50);
        assert!(params.order.is_none());
    }

    #[test]
    fn test_invalid_ordering() {
        let paging = Paging {
            sort: Some("title,,slug".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            paging.into_listing_params(10),
            Err(ApiError::InvalidQuery(_))
        ));

        let paging = Paging {
            page: Some(0),
            ..Default::default()
        };
        assert!(paging.validate().is_err());
    }

    #[test]
    fn test_page_from_batch() {
        let batch = Batch {
            offset: 20,
            limit: 10,
            rows: vec![1, 2, 3],
            total: 23,
        };
        let page = Page::from_batch(batch, 10).unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total, 23);

        let page = page.map(|n| n * 2);
        assert_eq!(page.rows, vec![2, 4, 6]);

        let empty: Batch<i32> = Batch {
            offset: 0,
            limit: 10,
            rows: vec![],
            total: 0,
        };
        let page = Page::from_batch(empty, 10).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
    }
}
