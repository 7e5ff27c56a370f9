//! Element queries that treat absence as a value.

use tracing::trace;

use crate::driver::WebDriver;
use crate::locator::Target;
use crate::result::FirmeResult;

/// Non-waiting lookups against the current DOM.
///
/// `find_one` returns `Ok(None)` and `find_many` an empty vector when nothing
/// matches; only driver failures become errors.
#[derive(Debug)]
pub struct ElementQuery<'d, D: WebDriver> {
    driver: &'d D,
}

impl<'d, D: WebDriver> ElementQuery<'d, D> {
    /// Query through a driver
    #[must_use]
    pub const fn new(driver: &'d D) -> Self {
        Self { driver }
    }

    /// First element matching the target, if any
    pub async fn find_one(&self, target: &Target) -> FirmeResult<Option<D::Element>> {
        let found = self.driver.find_element(target.locator()).await?;
        trace!(locator = %target, found = found.is_some(), "find_one");
        Ok(found)
    }

    /// All elements matching the target, in document order
    pub async fn find_many(&self, target: &Target) -> FirmeResult<Vec<D::Element>> {
        let found = self.driver.find_elements(target.locator()).await?;
        trace!(locator = %target, count = found.len(), "find_many");
        Ok(found)
    }

    /// Number of elements matching the target
    pub async fn count(&self, target: &Target) -> FirmeResult<usize> {
        Ok(self.find_many(target).await?.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};
    use crate::result::DriverError;

    #[tokio::test(start_paused = true)]
    async fn test_absent_is_none_not_error() {
        let driver = MockDriver::new();
        let query = ElementQuery::new(&driver);
        let target = Target::parse("#missing").unwrap();

        assert!(query.find_one(&target).await.unwrap().is_none());
        assert!(query.find_many(&target).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_many_returns_all_matches() {
        let driver = MockDriver::new();
        for _ in 0..3 {
            driver.add_element(MockElement::new(".item"));
        }
        let query = ElementQuery::new(&driver);
        let target = Target::parse("css=.item").unwrap();

        assert_eq!(query.count(&target).await.unwrap(), 3);
        assert!(query.find_one(&target).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_failure_propagates() {
        let driver = MockDriver::new();
        crate::driver::WebDriver::quit(&driver).await.unwrap();
        let query = ElementQuery::new(&driver);
        let err = query
            .find_one(&Target::parse("#x").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::FirmeError::Driver(DriverError::Session { .. })
        ));
    }
}
