//! Engine behaviour on whole job configurations
//!
//! Fixed scenarios first, then proptest properties over generated configs.

use jobmint::core::entities::{comment_content, pi_data};
use jobmint::dom::DocumentAccess;
use jobmint::{evaluate, xpath, EngineError, Intent, Outcome, XPathValue, XmlDocument};
use proptest::prelude::*;

const FREESTYLE: &str = r#"<?xml version='1.1' encoding='UTF-8'?>
<project>
  <actions/>
  <description>Nightly build</description>
  <keepDependencies>false</keepDependencies>
  <scm class="hudson.plugins.git.GitSCM" plugin="git@5.2.0">
    <userRemoteConfigs>
      <hudson.plugins.git.UserRemoteConfig>
        <url>https://git.example.com/app.git</url>
      </hudson.plugins.git.UserRemoteConfig>
    </userRemoteConfigs>
    <branches>
      <hudson.plugins.git.BranchSpec>
        <name>*/main</name>
      </hudson.plugins.git.BranchSpec>
    </branches>
  </scm>
  <disabled>false</disabled>
  <builders>
    <hudson.tasks.Shell>
      <command>make test &amp;&amp; make dist</command>
    </hudson.tasks.Shell>
  </builders>
</project>
"#;

fn mutate(value: &str) -> Intent {
    Intent::MatchAndMutate(value.to_string())
}

/// String-values of the nodes `query` selects in `doc`
fn values(doc: &str, query: &str) -> Vec<String> {
    let parsed = XmlDocument::parse(doc).unwrap();
    match xpath::evaluate(&parsed, query).unwrap() {
        XPathValue::NodeSet(nodes) => nodes.into_iter().map(|id| parsed.string_value(id)).collect(),
        other => panic!("expected a node-set, got {other:?}"),
    }
}

#[test]
fn test_description_rewrite() {
    let outcome = evaluate(
        "<project><description>old</description></project>",
        "//description",
        &mutate("new"),
    )
    .unwrap();
    assert_eq!(
        outcome,
        Outcome::Rewritten("<project><description>new</description></project>\n".to_string())
    );
}

#[test]
fn test_nonexistent_is_no_match() {
    let doc = "<project><description>old</description></project>";
    assert_eq!(evaluate(doc, "//nonexistent", &mutate("x")).unwrap(), Outcome::NoMatch);
}

#[test]
fn test_disable_job() {
    let outcome = evaluate(FREESTYLE, "/project/disabled", &mutate("true")).unwrap();
    let rewritten = outcome.into_rewritten().unwrap();
    assert!(rewritten.starts_with("<?xml version='1.1' encoding='UTF-8'?>"));
    assert_eq!(values(&rewritten, "//disabled"), ["true"]);
    // Everything else is left as it was
    assert!(rewritten.contains("<command>make test &amp;&amp; make dist</command>"));
    assert!(rewritten.contains(r#"<scm class="hudson.plugins.git.GitSCM" plugin="git@5.2.0">"#));
}

#[test]
fn test_find_by_predicates() {
    let cases = [
        ("//scm[@class = 'hudson.plugins.git.GitSCM']", true),
        ("//scm[starts-with(@plugin, 'git@')]", true),
        ("//branches//name[. = '*/main']", true),
        ("//builders/*[contains(command, 'make dist')]", true),
        ("/project[disabled = 'true']", false),
        ("//scm[@class = 'hudson.scm.NullSCM']", false),
        ("/project/description[normalize-space() = 'Nightly build']", true),
    ];
    for (query, expected) in cases {
        let outcome = evaluate(FREESTYLE, query, &Intent::MatchOnly).unwrap();
        assert_eq!(outcome.is_match(), expected, "{query}");
    }
}

#[test]
fn test_rewrite_attribute() {
    let outcome = evaluate(FREESTYLE, "//scm/@plugin", &mutate("git@5.3.0")).unwrap();
    let rewritten = outcome.into_rewritten().unwrap();
    assert_eq!(values(&rewritten, "//scm/@plugin"), ["git@5.3.0"]);
}

#[test]
fn test_malformed_reported_before_query() {
    for query in ["//a[1", "frobnicate(//a)", "", "$x"] {
        assert!(
            matches!(evaluate("<project>", query, &Intent::MatchOnly), Err(EngineError::Parse(_))),
            "{query:?}"
        );
    }
}

#[test]
fn test_comment_rewrite_stays_well_formed() {
    let doc = "<p><!--c--><?t d?></p>";
    let outcome = evaluate(doc, "//comment()", &mutate("a--b-")).unwrap();
    let rewritten = outcome.into_rewritten().unwrap();
    assert_eq!(rewritten, "<p><!--a- -b- --><?t d?></p>\n");
    assert_eq!(values(&rewritten, "//comment()"), ["a- -b- "]);

    let outcome = evaluate(doc, "//processing-instruction()", &mutate("x?>y")).unwrap();
    let rewritten = outcome.into_rewritten().unwrap();
    assert_eq!(rewritten, "<p><!--c--><?t x? >y?></p>\n");
    let again = evaluate(&rewritten, "//processing-instruction('t')", &mutate("x?>y")).unwrap();
    assert_eq!(again.into_rewritten().unwrap(), rewritten);
}

#[test]
fn test_deep_nesting_rewrite() {
    let depth = 70_000;
    let doc = format!("<a>{}</a>", "<a>".repeat(depth - 1) + &"</a>".repeat(depth - 1));
    let outcome = evaluate(&doc, "//a[not(a)]", &mutate("leaf")).unwrap();
    assert!(outcome.rewritten().is_some_and(|out| out.contains("<a>leaf</a>")));
}

#[test]
fn test_deeply_nested_query_rejected() {
    let query = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
    assert!(matches!(
        evaluate("<project/>", &query, &Intent::MatchOnly),
        Err(EngineError::Query(_))
    ));
}

#[test]
fn test_malformed_and_invalid() {
    assert!(matches!(
        evaluate("<project><a></b></project>", "//a", &Intent::MatchOnly),
        Err(EngineError::Parse(_))
    ));
    assert!(matches!(
        evaluate(FREESTYLE, "//a[1", &Intent::MatchOnly),
        Err(EngineError::Query(_))
    ));
    assert!(matches!(
        evaluate(FREESTYLE, "frobnicate(//a)", &Intent::MatchOnly),
        Err(EngineError::Query(_))
    ));
}

// ============================================================================
// Properties
// ============================================================================

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9._-]{0,8}"
}

/// Text with the characters that need escaping, plus some non-ASCII
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 <>&\"'éß€]{0,24}"
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A `<project>` whose children are `<name>text</name>` elements, plus one
/// `<cmd>` inside each builder
fn config_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec((name_strategy(), value_strategy()), 0..6),
        prop::collection::vec(value_strategy(), 1..4),
    )
        .prop_map(|(fields, commands)| {
            let mut doc = String::from("<project>");
            for (name, text) in fields {
                doc.push_str(&format!("<{name}>{}</{name}>", escape(&text)));
            }
            doc.push_str("<builders>");
            for command in commands {
                doc.push_str(&format!("<shell><cmd>{}</cmd></shell>", escape(&command)));
            }
            doc.push_str("</builders></project>");
            doc
        })
}

/// Queries that compile and queries that do not
fn query_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "//[a-z]{1,6}",
        "//[a-z]{1,6}\\[[0-9]",
        Just("//a[1".to_string()),
        Just("frobnicate(//a)".to_string()),
        Just("$job".to_string()),
        Just(String::new()),
    ]
}

/// Non-empty values built from the sequences that end comments, processing
/// instructions and CDATA sections
fn markup_value_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("--".to_string()),
            Just("-".to_string()),
            Just("?>".to_string()),
            Just("]]>".to_string()),
            Just(" ".to_string()),
            "[a-z<&>'\"]{1,4}",
        ],
        1..6,
    )
    .prop_map(|parts| parts.concat())
}

const MARKUP: &str = "<project><!--keep--><?step run?><b>t</b><b><![CDATA[raw]]></b></project>";

proptest! {
    /// Property: a query selecting nothing reports NoMatch under either intent
    #[test]
    fn prop_zero_matches_is_no_match(doc in config_strategy(), value in value_strategy()) {
        prop_assert_eq!(evaluate(&doc, "//absent", &Intent::MatchOnly).unwrap(), Outcome::NoMatch);
        prop_assert_eq!(evaluate(&doc, "//absent", &mutate(&value)).unwrap(), Outcome::NoMatch);
    }

    /// Property: match-only never produces a document
    #[test]
    fn prop_match_only_does_not_rewrite(doc in config_strategy()) {
        prop_assert_eq!(evaluate(&doc, "//cmd", &Intent::MatchOnly).unwrap(), Outcome::Matched);
    }

    /// Property: every matched node reads back as the new value
    #[test]
    fn prop_rewrite_reads_back(doc in config_strategy(), value in value_strategy()) {
        let rewritten = evaluate(&doc, "//cmd", &mutate(&value)).unwrap().into_rewritten().unwrap();
        let read_back = values(&rewritten, "//cmd");
        prop_assert!(!read_back.is_empty());
        for got in read_back {
            prop_assert_eq!(&got, &value);
        }
    }

    /// Property: applying the same mutation twice changes nothing the second time
    #[test]
    fn prop_rewrite_is_idempotent(doc in config_strategy(), value in value_strategy()) {
        let once = evaluate(&doc, "//cmd", &mutate(&value)).unwrap().into_rewritten().unwrap();
        let twice = evaluate(&once, "//cmd", &mutate(&value)).unwrap().into_rewritten().unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: attribute rewrites survive quoting and re-parsing
    #[test]
    fn prop_attribute_rewrite_reads_back(value in value_strategy()) {
        let doc = "<project><scm class=\"hudson.scm.NullSCM\"/></project>";
        let rewritten = evaluate(doc, "//scm/@class", &mutate(&value)).unwrap().into_rewritten().unwrap();
        prop_assert_eq!(values(&rewritten, "//scm/@class"), vec![value]);
    }

    /// Property: an unclosed root is a parse error whatever the query,
    /// including queries that would not compile
    #[test]
    fn prop_malformed_is_parse_error(doc in config_strategy(), query in query_strategy()) {
        let truncated = doc.trim_end_matches("</project>");
        prop_assert!(matches!(
            evaluate(truncated, &query, &Intent::MatchOnly),
            Err(EngineError::Parse(_))
        ));
    }

    /// Property: rewritten text and CDATA nodes read back exactly and a
    /// second identical rewrite changes nothing
    #[test]
    fn prop_text_rewrite_round_trips(value in markup_value_strategy()) {
        let once = evaluate(MARKUP, "//text()", &mutate(&value)).unwrap().into_rewritten().unwrap();
        let read_back = values(&once, "//text()");
        prop_assert_eq!(read_back.len(), 2);
        for got in read_back {
            prop_assert_eq!(&got, &value);
        }
        let twice = evaluate(&once, "//text()", &mutate(&value)).unwrap().into_rewritten().unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: comment and processing-instruction rewrites always produce
    /// a parseable document, read back as the sanitized value, and are stable
    #[test]
    fn prop_comment_and_pi_rewrite_round_trips(value in markup_value_strategy()) {
        let cases = [
            ("//comment()", comment_content(&value).into_owned()),
            ("//processing-instruction()", pi_data(&value).into_owned()),
        ];
        for (query, expected) in cases {
            let once = evaluate(MARKUP, query, &mutate(&value)).unwrap().into_rewritten().unwrap();
            prop_assert_eq!(values(&once, query), vec![expected]);
            let twice = evaluate(&once, query, &mutate(&value)).unwrap().into_rewritten().unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
