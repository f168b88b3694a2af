use agentfs_core::search::MatchType;

mod fixture;

#[test]
fn test_filename_match_ranks_first() {
    fixture::run(|mut fixture| async move {
        let matches = fixture
            .facade
            .search(&mut fixture.session, "where is the config loaded", None)
            .await
            .unwrap();

        assert_eq!(matches[0].file_path, "src/config.rs");
        assert_eq!(matches[0].match_type, MatchType::Both);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
        // Ignored trees never show up.
        assert!(matches
            .iter()
            .all(|m| !m.file_path.starts_with("node_modules/") && !m.file_path.starts_with("target/")));
    });
}

#[test]
fn test_content_only_matches() {
    fixture::run(|mut fixture| async move {
        let matches = fixture
            .facade
            .search(&mut fixture.session, "handle_login", None)
            .await
            .unwrap();

        let handler = matches
            .iter()
            .find(|m| m.file_path == "src/auth/login_handler.rs")
            .unwrap();
        assert_eq!(handler.match_type, MatchType::Both);
        assert_eq!(handler.line_matches[0].line, 1);
    });
}

#[test]
fn test_max_results_from_settings() {
    fixture::run_with_settings(
        |settings| settings.file_search.max_results = 1,
        |mut fixture| async move {
            let matches = fixture
                .facade
                .search(&mut fixture.session, "config", None)
                .await
                .unwrap();
            assert_eq!(matches.len(), 1);

            let more = fixture
                .facade
                .search(&mut fixture.session, "config", Some(10))
                .await
                .unwrap();
            assert!(more.len() > 1);
        },
    );
}

#[test]
fn test_stop_word_query_returns_nothing() {
    fixture::run(|mut fixture| async move {
        let matches = fixture
            .facade
            .search(&mut fixture.session, "what is this", None)
            .await
            .unwrap();
        assert!(matches.is_empty());
    });
}

#[test]
fn test_rendered_context_has_snippets() {
    fixture::run(|mut fixture| async move {
        let matches = fixture
            .facade
            .search(&mut fixture.session, "AppConfig", Some(3))
            .await
            .unwrap();
        let rendered = fixture
            .facade
            .render_search_context(&fixture.session, &matches)
            .await
            .unwrap();

        assert!(rendered.starts_with("Search Results:\n"));
        assert!(rendered.contains("=== src/config.rs (score "));
        assert!(rendered.contains("2: pub struct AppConfig;"));
    });
}
