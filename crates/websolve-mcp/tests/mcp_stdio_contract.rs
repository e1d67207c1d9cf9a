use std::collections::BTreeSet;

fn arguments(v: serde_json::Value) -> Option<serde_json::Map<String, serde_json::Value>> {
    v.as_object().cloned()
}

#[test]
fn websolve_stdio_tool_surface() {
    // True end-to-end check (spawns a child process); skipped by default.
    if std::env::var("WEBSOLVE_E2E").ok().as_deref() != Some("1") {
        eprintln!("skipping: set WEBSOLVE_E2E=1 to run this test");
        return;
    }

    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    rt.block_on(async {
        use axum::{extract::Query, routing::get, Json, Router};
        use rmcp::{
            model::CallToolRequestParam,
            service::ServiceExt,
            transport::{ConfigureCommandExt, TokioChildProcess},
        };
        use std::collections::HashMap;
        use std::net::SocketAddr;

        // Offline SearXNG stand-in plus one page to fetch.
        let app = Router::new()
            .route(
                "/search",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let query = q.get("q").cloned().unwrap_or_default();
                    Json(serde_json::json!({
                        "query": query,
                        "number_of_results": 3,
                        "results": [
                            {
                                "url": "https://stackoverflow.com/questions/1/keyerror-id",
                                "title": "KeyError: 'id' when reading a dict",
                                "content": "Use dict.get('id') to avoid the KeyError.",
                                "engine": "duckduckgo"
                            },
                            {
                                "url": "https://github.com/acme/api/issues/2",
                                "title": "KeyError id in serializer",
                                "content": "Fixed by checking the key first.",
                                "engine": "github"
                            },
                            {
                                "url": "https://docs.python.org/3/library/exceptions.html#KeyError",
                                "title": "Built-in Exceptions",
                                "content": "Raised when a mapping key is not found.",
                                "engine": "bing"
                            }
                        ]
                    }))
                }),
            )
            .route(
                "/page",
                get(|| async {
                    (
                        [("content-type", "text/html")],
                        "<html><head><title>Fixture</title><script>track()</script></head><body><h1>Hello</h1><p>world</p></body></html>",
                    )
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("axum serve");
        });

        let bin = assert_cmd::cargo::cargo_bin!("websolve");
        let service = ()
            .serve(TokioChildProcess::new(
                tokio::process::Command::new(bin).configure(|cmd| {
                    cmd.args(["mcp-stdio"]);
                    cmd.env("SEARXNG_URL", format!("http://{addr}"));
                    cmd.env("WEBSOLVE_ALLOW_PRIVATE_URLS", "true");
                    cmd.env("WEBSOLVE_FETCH_CONTENT", "false");
                    cmd.env_remove("WEBSOLVE_ENV_FILE");
                    cmd.env_remove("WEBSOLVE_SEARXNG_ENDPOINTS");
                    cmd.env_remove("WEBSOLVE_PATTERNS_FILE");
                }),
            )?)
            .await?;

        let tools = service.list_tools(Default::default()).await?;
        let names: BTreeSet<String> = tools
            .tools
            .iter()
            .map(|t| t.name.clone().into_owned())
            .collect();
        for must_have in [
            "metasearch_web",
            "fetch_web_content",
            "analyze_search_results",
            "find_error_solutions",
        ] {
            assert!(names.contains(must_have), "missing tool {must_have}");
        }

        let call = |name: &'static str, args: serde_json::Value| {
            let service = &service;
            async move {
                let r = service
                    .call_tool(CallToolRequestParam {
                        name: name.into(),
                        arguments: arguments(args),
                    })
                    .await?;
                let text = r
                    .content
                    .first()
                    .and_then(|c| c.as_text())
                    .map(|t| t.text.clone())
                    .unwrap_or_default();
                let v = r.structured_content.unwrap_or_default();
                Ok::<_, Box<dyn std::error::Error>>((v, text))
            }
        };

        let (v, md) = call("metasearch_web", serde_json::json!({ "query": "KeyError id" })).await?;
        assert_eq!(v["ok"].as_bool(), Some(true), "{v}");
        assert_eq!(v["kind"].as_str(), Some("metasearch_web"));
        assert_eq!(v["results"].as_array().map(Vec::len), Some(3));
        assert_eq!(v["total_hint"].as_u64(), Some(3));
        assert!(md.starts_with("**Result 1: KeyError: 'id' when reading a dict**"));

        let (v, _) = call("metasearch_web", serde_json::json!({})).await?;
        assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));

        let (v, md) = call(
            "find_error_solutions",
            serde_json::json!({
                "error_message": "Traceback (most recent call last):\n  File \"app.py\", line 3\nKeyError: 'id'",
                "tech_stack": "python",
                "max_results": 2
            }),
        )
        .await?;
        assert_eq!(v["ok"].as_bool(), Some(true), "{v}");
        assert_eq!(v["error_kind"].as_str(), Some("KeyError"));
        assert_eq!(v["solutions"].as_array().map(Vec::len), Some(2));
        assert_eq!(v["stats"]["queries_failed"].as_u64(), Some(0));
        assert!(md.contains("## 1. "));

        let (v, _) = call(
            "find_error_solutions",
            serde_json::json!({ "error_message": "KeyError: 'id'", "max_results": 0 }),
        )
        .await?;
        assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));

        let (v, md) = call(
            "analyze_search_results",
            serde_json::json!({
                "search_results": [
                    { "title": "KeyError in Python", "url": "https://stackoverflow.com/q/1", "content": "python keyerror dict" },
                    { "title": "Python dict KeyError", "url": "https://docs.python.org/3/", "content": "python dict" }
                ],
                "analysis_type": "keywords"
            }),
        )
        .await?;
        assert_eq!(v["ok"].as_bool(), Some(true), "{v}");
        assert_eq!(v["analysis_type"].as_str(), Some("keywords"));
        assert!(md.contains("```json"));

        let (v, md) = call(
            "fetch_web_content",
            serde_json::json!({ "url": format!("http://{addr}/page"), "format": "text" }),
        )
        .await?;
        assert_eq!(v["ok"].as_bool(), Some(true), "{v}");
        assert_eq!(v["title"].as_str(), Some("Fixture"));
        assert!(md.contains("Hello"));
        assert!(!md.contains("track()"));

        let (v, _) = call("fetch_web_content", serde_json::json!({ "url": "" })).await?;
        assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));

        service.cancel().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
    .expect("mcp stdio contract");
}
