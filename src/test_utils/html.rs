use axum::response::Response;
use scraper::Html;

/// Read an htmx fragment response into a parsed HTML fragment.
pub(crate) async fn parse_html_fragment(response: Response) -> Html {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("could not read the response body");
    let text = std::str::from_utf8(&bytes).expect("response body is not UTF-8");

    Html::parse_fragment(text)
}

#[track_caller]
pub(crate) fn assert_valid_html(html: &Html) {
    assert!(
        html.errors.is_empty(),
        "HTML has parse errors: {:?}",
        html.errors
    );
}
