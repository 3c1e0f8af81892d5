//! Builds the backend query for a navigation.
//!
//! The first navigation asks for everything (`include=*`) because the client
//! holds nothing yet. Subsequent navigations announce what the client
//! already has (current layout, loaded translation catalogues) so the
//! backend can answer with the delta, plus the common elements the
//! configuration wants re-delivered on every page change.

use crate::api::{Include, ResourceQuery};
use crate::context::AppContext;
use crate::domain::Route;

/// Fields requested on subsequent navigations.
const SUBSEQUENT_INCLUDES: [&str; 2] = ["content", "data"];

/// Builds the page query for a navigation to `to`.
#[must_use]
pub fn build_page_query(app: &AppContext, to: &Route, initial: bool) -> ResourceQuery {
    let mut query = ResourceQuery::for_slug(to.path.clone());
    if initial {
        query.include = Include::All;
        return query;
    }

    query.include = Include::Fields(
        SUBSEQUENT_INCLUDES
            .iter()
            .map(ToString::to_string)
            .collect(),
    );
    if let Ok(page) = app.page_context() {
        query.current_layout = Some(page.layout());
    }
    query.loaded_languages = app.translation().loaded_language_codes();

    let refresh = app.config().router.refresh_common_elements;
    if !refresh.is_empty() {
        query.refresh_common = Some(refresh.join(","));
    }
    query
}
