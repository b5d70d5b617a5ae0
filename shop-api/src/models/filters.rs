use serde::Deserialize;
use shop_models::{ProductFilter, ProductStatus, UserFilter, UserRole};
use shop_storage::Paging;

/// Query string of the product listing. Numeric values stay raw so that
/// unparseable ones can be treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub cursor: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
    pub name: Option<String>,
    /// Comma separated product statuses.
    pub statuses: Option<String>,
}

impl ProductQuery {
    pub fn paging(&self) -> Paging {
        Paging::from_query(
            self.cursor.as_deref(),
            self.page_size.as_deref(),
            self.sort.as_deref(),
        )
    }

    pub fn filter(&self) -> Result<ProductFilter, String> {
        Ok(ProductFilter {
            name: self.name.clone().filter(|name| !name.is_empty()),
            statuses: split_list(self.statuses.as_deref())
                .map(|s| s.parse::<ProductStatus>().map_err(|e| e.to_string()))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    /// Comma separated roles.
    pub roles: Option<String>,
}

impl UserQuery {
    pub fn filter(&self) -> Result<UserFilter, String> {
        Ok(UserFilter {
            search: self.search.clone().filter(|search| !search.is_empty()),
            roles: split_list(self.roles.as_deref())
                .map(|r| r.parse::<UserRole>().map_err(|e| e.to_string()))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    pub product_name: Option<String>,
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
