//! Search index behavior tests.

use super::*;
use crate::models::gist::GistFile;
use chrono::{Duration, TimeZone, Utc};

fn gist_at(id: &str, description: &str, minutes: i64) -> Gist {
    let mut gist = Gist::new(id, description);
    gist.updated_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
    gist
}

fn ids(gists: &[Gist]) -> Vec<&str> {
    gists.iter().map(|gist| gist.id.as_str()).collect()
}

fn unit_snapshot(index: &SearchIndex) -> Vec<SearchableUnit> {
    index.units().cloned().collect()
}

fn sample_gists() -> Vec<Gist> {
    vec![
        gist_at("aaa111", "docker compose for postgres", 1)
            .with_file(GistFile::unloaded("docker-compose.yml", 10).with_language("YAML")),
        gist_at("bbb222", "[Parser] tokenizer experiments #rust", 2)
            .with_file(GistFile::loaded("lexer.rs", "fn lex() { /* zebracorn */ }").with_language("Rust"))
            .with_file(GistFile::unloaded("README.md", 5).with_language("Markdown")),
        gist_at("ccc333", "shopping list", 3),
    ]
}

#[test]
fn gist_without_files_produces_one_empty_unit() {
    let gist = gist_at("solo", "only a description", 0);
    let units = units_for(&gist);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].filename, "");
    assert_eq!(units[0].language, "");
    assert_eq!(units[0].content, None);

    let index = SearchIndex::build([&gist]);
    assert_eq!(ids(&index.search("only a description")), vec!["solo"]);
    assert_eq!(ids(&index.search("solo")), vec!["solo"]);
}

#[test]
fn units_carry_loaded_content_only() {
    let gists = sample_gists();
    let units = units_for(&gists[1]);
    assert_eq!(units.len(), 2);
    let lexer = units.iter().find(|u| u.filename == "lexer.rs").expect("lexer unit");
    assert!(lexer.content.as_deref().unwrap_or("").contains("zebracorn"));
    let readme = units.iter().find(|u| u.filename == "README.md").expect("readme unit");
    assert_eq!(readme.content, None);
}

#[test]
fn one_character_fuzzy_queries_return_nothing() {
    let index = SearchIndex::build(&sample_gists());
    for query in ["a", "r", " s ", "", "é"] {
        assert!(index.search(query).is_empty(), "query {:?}", query);
    }
}

#[test]
fn fuzzy_search_tolerates_typos_and_dedupes_by_gist() {
    let index = SearchIndex::build(&sample_gists());
    assert_eq!(ids(&index.search("postgress")), vec!["aaa111"]);
    assert_eq!(ids(&index.search("tokenizer")), vec!["bbb222"]);
    // Both files of bbb222 match the language/description; the gist appears once.
    assert_eq!(ids(&index.search("experiments")), vec!["bbb222"]);
    assert!(index.search("qqqqqqqq").is_empty());
}

#[test]
fn fuzzy_search_does_not_look_at_file_content() {
    let index = SearchIndex::build(&sample_gists());
    assert!(index.search("zebracorn").is_empty());
}

#[test]
fn regex_query_is_case_insensitive_with_i_flag() {
    let gists = vec![
        gist_at("upper", "contains ABC here", 1),
        gist_at("other", "only xyz", 2),
    ];
    let index = SearchIndex::build(&gists);
    assert_eq!(ids(&index.search("/abc/i")), vec!["upper"]);
    assert!(index.search("/abc/").is_empty());
}

#[test]
fn regex_scans_filenames_languages_ids_and_loaded_content() {
    let index = SearchIndex::build(&sample_gists());
    assert_eq!(ids(&index.search(r"/\.yml$/")), vec!["aaa111"]);
    assert_eq!(ids(&index.search("/^Markdown$/")), vec!["bbb222"]);
    assert_eq!(ids(&index.search("/^ccc/")), vec!["ccc333"]);
    assert_eq!(ids(&index.search("/zebra.orn/")), vec!["bbb222"]);
    // Newest first in scan order.
    assert_eq!(ids(&index.search("/./")), vec!["ccc333", "bbb222", "aaa111"]);
}

#[test]
fn invalid_regex_falls_back_to_fuzzy_search_of_raw_query() {
    let gists = vec![gist_at("weird", "pattern /([a-/ from a bug report", 1)];
    let index = SearchIndex::build(&gists);
    assert_eq!(ids(&index.search("/([a-/")), vec!["weird"]);
}

#[test]
fn add_then_search_unique_text_finds_only_that_gist() {
    let mut index = SearchIndex::build(&sample_gists());
    let added = gist_at("ddd444", "quixotic flamingo recipes", 4);
    index.add(&added);

    assert_eq!(ids(&index.search("quixotic flamingo")), vec!["ddd444"]);
    assert!(index.remove("ddd444"));
    assert!(index.search("quixotic flamingo").is_empty());
    assert!(!index.remove("ddd444"));
}

#[test]
fn incremental_mutations_match_full_rebuild() {
    let mut gists = sample_gists();
    let mut index = SearchIndex::build(&gists);

    let added = gist_at("eee555", "new arrival", 0);
    index.add(&added);
    gists.push(added);

    let mut changed = gists[0].clone();
    changed.description = "docker swarm notes".to_string();
    changed.updated_at = changed.updated_at + Duration::minutes(60);
    changed = changed.with_file(GistFile::unloaded("stack.yml", 3).with_language("YAML"));
    index.update(&changed);
    gists[0] = changed;

    index.remove("ccc333");
    gists.retain(|gist| gist.id != "ccc333");

    let rebuilt = SearchIndex::build(&gists);
    assert_eq!(unit_snapshot(&index), unit_snapshot(&rebuilt));
    assert_eq!(index.len(), rebuilt.len());
    assert_eq!(index.unit_count(), rebuilt.unit_count());
    for query in ["docker", "/yml/", "arrival", "tokenizer", "shopping"] {
        assert_eq!(ids(&index.search(query)), ids(&rebuilt.search(query)), "query {}", query);
    }
}

#[test]
fn update_refreshes_content_for_regex_scans() {
    let gist = gist_at("lazy", "lazy gist", 1).with_file(GistFile::unloaded("a.txt", 4));
    let mut index = SearchIndex::build([&gist]);
    assert!(index.search("/needle/").is_empty());

    let loaded = gist_at("lazy", "lazy gist", 1).with_file(GistFile::loaded("a.txt", "hay needle hay"));
    index.update(&loaded);
    assert_eq!(ids(&index.search("/needle/")), vec!["lazy"]);
    assert_eq!(index.len(), 1);
    assert!(index.contains("lazy"));
}
