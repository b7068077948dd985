use super::*;

#[test]
fn extracts_body_text_line_by_line() {
    let html = r#"
        <html>
            <head><title>Race Report</title></head>
            <body>
                <h1>  Bahrain Grand Prix  </h1>

                <p>Lewis Hamilton won the race.</p>
                <p>   </p>
            </body>
        </html>
    "#;

    let text = extract_text(html).expect("extraction should succeed");
    assert_eq!(text, "Bahrain Grand Prix\nLewis Hamilton won the race.");
}

#[test]
fn drops_boilerplate_subtrees() {
    let html = r#"
        <html><body>
            <header><p>Site header</p></header>
            <nav><a href="/">Home</a></nav>
            <script>var tracking = true;</script>
            <style>p { color: red; }</style>
            <noscript>Enable JavaScript</noscript>
            <p>Race content</p>
            <aside>Related links</aside>
            <footer>Copyright</footer>
        </body></html>
    "#;

    let text = extract_text(html).expect("extraction should succeed");
    assert_eq!(text, "Race content");
}

#[test]
fn prefers_first_article_or_main() {
    let html = r#"
        <html><body>
            <p>Cookie banner</p>
            <article>
                <p>First article</p>
            </article>
            <main><p>Main content</p></main>
        </body></html>
    "#;

    let text = extract_text(html).expect("extraction should succeed");
    assert_eq!(text, "First article");
}

#[test]
fn ignores_main_inside_dropped_elements() {
    let html = r#"
        <html><body>
            <header><main>Header main</main></header>
            <main><p>Real main</p></main>
        </body></html>
    "#;

    let text = extract_text(html).expect("extraction should succeed");
    assert_eq!(text, "Real main");
}

#[test]
fn inline_elements_are_concatenated() {
    let html = "<html><body><p>Max <b>Verstappen</b> took pole</p></body></html>";

    let text = extract_text(html).expect("extraction should succeed");
    assert_eq!(text, "Max Verstappen took pole");
}

#[test]
fn empty_document_yields_empty_text() {
    assert_eq!(extract_text("").expect("extraction should succeed"), "");
    assert_eq!(
        extract_text("<html><body><script>x()</script></body></html>")
            .expect("extraction should succeed"),
        ""
    );
}

#[test]
fn clean_text_trims_and_drops_empty_lines() {
    assert_eq!(clean_text("  a  \n\n\t\n b\r\n"), "a\nb");
    assert_eq!(clean_text(""), "");
}
