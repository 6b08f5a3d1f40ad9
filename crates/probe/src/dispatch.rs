//! Action dispatch: resolve a locator, then click

use tracing::debug;

use crate::driver::{ClickOptions, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Click the match at `options.index` (the first one by default).
///
/// Zero matches is [`E2eError::ElementNotFound`]. A forced click skips
/// actionability checks, so it lands even while the game's CSS transitions
/// still cover the element. Retries belong to the caller's poll loop; the
/// only re-attempt here is a single re-resolve when the element detached
/// between resolving and clicking.
pub async fn click(driver: &mut dyn PageDriver, locator: &Locator, options: ClickOptions) -> E2eResult<()> {
    resolve(driver, locator, options.index).await?;

    match driver.click(locator, options).await {
        Err(E2eError::StaleElement(reason)) => {
            debug!(%locator, %reason, "element detached, re-resolving once");
            resolve(driver, locator, options.index).await?;
            driver.click(locator, options).await
        }
        other => other,
    }
}

/// Click the first match that is currently visible; `None` when none is
pub async fn click_first_visible(
    driver: &mut dyn PageDriver,
    locator: &Locator,
    force: bool,
) -> E2eResult<Option<usize>> {
    let total = driver.count(locator).await?;
    for index in 0..total {
        if driver.is_visible(locator, index).await? {
            click(driver, locator, ClickOptions { force, index }).await?;
            return Ok(Some(index));
        }
    }
    Ok(None)
}

async fn resolve(driver: &mut dyn PageDriver, locator: &Locator, index: usize) -> E2eResult<usize> {
    let matches = driver.count(locator).await?;
    if matches == 0 {
        return Err(E2eError::ElementNotFound(locator.to_string()));
    }
    if index >= matches {
        return Err(E2eError::ElementNotFound(format!(
            "{} (index {} of {} matches)",
            locator, index, matches
        )));
    }
    if matches > 1 {
        debug!(%locator, matches, index, "several matches, using index");
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeElement, FakePage, FakeState};
    use std::time::Duration;

    async fn page_with(elements: Vec<FakeElement>) -> (FakePage, Locator) {
        let grid = Locator::css(".grid.grid-cols-3 button");
        let mut state = FakeState::new("http://game.test/");
        for el in elements {
            state = state.element(&grid, el);
        }
        let mut page = FakePage::new().state("race", state).route("", "race");
        page.goto("http://game.test/", Duration::from_secs(1)).await.unwrap();
        (page, grid)
    }

    #[tokio::test]
    async fn test_forced_click_lands_on_animating_element() {
        let (mut page, grid) = page_with(vec![FakeElement::new("3").animating()]).await;

        let err = click(&mut page, &grid, ClickOptions::default()).await.unwrap_err();
        assert!(matches!(err, E2eError::NotInteractable(_)));

        click(&mut page, &grid, ClickOptions::forced()).await.unwrap();
        let recorded = page.recorder();
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.clicks.len(), 1);
        assert!(recorded.clicks[0].force);
    }

    #[tokio::test]
    async fn test_zero_matches_is_not_found() {
        let (mut page, _) = page_with(vec![]).await;
        let err = click(&mut page, &Locator::button("⏸️"), ClickOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_first_match_is_used() {
        let (mut page, grid) =
            page_with(vec![FakeElement::new("1"), FakeElement::new("2"), FakeElement::new("3")]).await;

        click(&mut page, &grid, ClickOptions::default()).await.unwrap();
        click(&mut page, &grid, ClickOptions::default().nth(1)).await.unwrap();

        let recorded = page.recorder();
        let indices: Vec<_> = recorded.lock().unwrap().clicks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);

        let err = click(&mut page, &grid, ClickOptions::default().nth(3)).await.unwrap_err();
        assert!(matches!(err, E2eError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_stale_element_re_resolved_once() {
        let (mut page, grid) = page_with(vec![FakeElement::new("1").stale_for(1)]).await;
        click(&mut page, &grid, ClickOptions::forced()).await.unwrap();

        let (mut page, grid) = page_with(vec![FakeElement::new("1").stale_for(2)]).await;
        let err = click(&mut page, &grid, ClickOptions::forced()).await.unwrap_err();
        assert!(matches!(err, E2eError::StaleElement(_)));
    }

    #[tokio::test]
    async fn test_click_first_visible_skips_hidden() {
        let (mut page, grid) = page_with(vec![FakeElement::new("a").hidden(), FakeElement::new("b")]).await;
        assert_eq!(click_first_visible(&mut page, &grid, false).await.unwrap(), Some(1));

        let (mut page, grid) = page_with(vec![FakeElement::new("a").hidden()]).await;
        assert_eq!(click_first_visible(&mut page, &grid, false).await.unwrap(), None);
    }
}
