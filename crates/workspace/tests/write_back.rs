use serde_json::json;
use wsconf_jsonc::parse;
use wsconf_workspace::{
    read_workspace, write_workspace, MemoryHost, ProjectCollection, ProjectDefinition,
    ProjectDraft, Segment, TargetDefinition, TargetDraft, WorkspaceDefinition, WorkspaceError,
    WorkspaceWriter,
};

const PATH: &str = "/repo/workspace.json";

fn host_with(text: &str) -> MemoryHost {
    MemoryHost::new().with_file(PATH, text)
}

fn written(host: &MemoryHost) -> String {
    host.file(PATH).expect("workspace file")
}

const COMMENTED: &str = r#"{
  // Generated by hand
  "$schema": "./schema.json",
  "version": 1,
  "cli": { "analytics": false }, /* keep */
  "defaultProject": "web",
  "newProjectRoot": "apps",
  "projects": {
    "web": {
      "root": "apps/web",
      "targets": {
        "build": {
          "builder": "tool:build",
          "options": { "outputPath": "dist/web" }
        }
      }
    }
  }
}
"#;

#[test]
fn unchanged_workspace_is_not_written() {
    let host = host_with(COMMENTED);
    let workspace = read_workspace(PATH, &host).expect("read");
    write_workspace(&workspace, &host, None).expect("write");
    assert_eq!(host.write_count(), 0);
    assert_eq!(written(&host), COMMENTED);
}

#[test]
fn single_extension_change_touches_only_its_span() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace
        .extensions_mut()
        .insert("defaultProject", json!("api"))
        .expect("set extension");
    assert_eq!(workspace.change_count(), 1);

    write_workspace(&workspace, &host, None).expect("write");
    assert_eq!(host.write_count(), 1);
    assert_eq!(
        written(&host),
        COMMENTED.replace("\"defaultProject\": \"web\"", "\"defaultProject\": \"api\"")
    );
}

#[test]
fn concrete_prefix_scenario() {
    let host = host_with(r#"{"version":1,"projects":{"a":{"root":"src/a"}}}"#);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace
        .projects_mut()
        .get_mut("a")
        .expect("project a")
        .set_prefix(Some("app"));
    write_workspace(&workspace, &host, None).expect("write");

    let value = parse(&written(&host)).expect("reparse");
    assert_eq!(
        value,
        json!({"version": 1, "projects": {"a": {"root": "src/a", "prefix": "app"}}})
    );
    let keys: Vec<_> = value["projects"]["a"]
        .as_object()
        .expect("object")
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["root", "prefix"]);
}

#[test]
fn writing_does_not_consume_the_journal() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace
        .projects_mut()
        .get_mut("web")
        .expect("web")
        .set_source_root(Some("apps/web/src"));

    write_workspace(&workspace, &host, None).expect("first write");
    let first = written(&host);
    write_workspace(&workspace, &host, None).expect("second write");
    assert_eq!(written(&host), first);
    assert!(workspace.has_changes());
    assert!(first.contains("// Generated by hand"));
    assert!(first.contains("/* keep */"));
}

#[test]
fn target_edits_are_nested_under_their_project() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    let web = workspace.projects_mut().get_mut("web").expect("web");
    let build = web.targets_mut().get_mut("build").expect("build");
    build.set_option("outputPath", Some(json!("out/web")));
    build.set_configuration_option("production", "optimization", Some(json!(true)));
    web.targets_mut()
        .add("test", TargetDefinition::new("tool:test"))
        .expect("add target");

    write_workspace(&workspace, &host, None).expect("write");
    let value = parse(&written(&host)).expect("reparse");
    assert_eq!(
        value["projects"]["web"]["targets"],
        json!({
            "build": {
                "builder": "tool:build",
                "options": {"outputPath": "out/web"},
                "configurations": {"production": {"optimization": true}}
            },
            "test": {"builder": "tool:test"}
        })
    );
}

#[test]
fn legacy_documents_keep_architect_key() {
    let text = r#"{
  "version": 1,
  "projects": {
    "old": {
      "root": "",
      "architect": {
        "build": { "builder": "tool:build" }
      }
    }
  }
}"#;
    let host = host_with(text);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    let old = workspace.projects_mut().get_mut("old").expect("old");
    assert!(old.targets().contains("build"));
    old.targets_mut()
        .add("lint", TargetDefinition::new("tool:lint"))
        .expect("add");
    workspace
        .projects_mut()
        .add(
            "fresh",
            ProjectDraft::new("libs/fresh")
                .target("build", TargetDraft::new("tool:build"))
                .build()
                .expect("draft"),
        )
        .expect("add project");

    write_workspace(&workspace, &host, None).expect("write");
    let value = parse(&written(&host)).expect("reparse");
    assert_eq!(
        value["projects"]["old"]["architect"]["lint"],
        json!({"builder": "tool:lint"})
    );
    assert!(value["projects"]["old"].get("targets").is_none());
    assert_eq!(
        value["projects"]["fresh"],
        json!({"root": "libs/fresh", "architect": {"build": {"builder": "tool:build"}}})
    );
}

#[test]
fn deleting_last_target_drops_the_member() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    let web = workspace.projects_mut().get_mut("web").expect("web");
    assert!(web.targets_mut().delete("build").is_some());

    write_workspace(&workspace, &host, None).expect("write");
    let value = parse(&written(&host)).expect("reparse");
    assert_eq!(value["projects"]["web"], json!({"root": "apps/web"}));
}

#[test]
fn removing_every_project_drops_projects_key() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace.set_projects(ProjectCollection::new());
    write_workspace(&workspace, &host, None).expect("write");

    let value = parse(&written(&host)).expect("reparse");
    assert!(value.get("projects").is_none());
    assert_eq!(value["newProjectRoot"], json!("apps"));
}

#[test]
fn whole_object_write_supersedes_nested_edits() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    let extensions = workspace.extensions_mut();
    extensions
        .set_path(
            &["cli".into(), "cache".into(), "enabled".into()],
            Some(json!(true)),
        )
        .expect("deep set");
    extensions
        .insert("cli", json!({"packageManager": "pnpm"}))
        .expect("replace");

    let journal = workspace.journal().expect("journal");
    assert_eq!(journal.len(), 1);
    assert_eq!(journal.iter().next().expect("entry").path.to_string(), "/cli");
}

#[test]
fn deep_equal_writes_are_not_recorded() {
    let host = host_with(COMMENTED);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace
        .extensions_mut()
        .insert("cli", json!({"analytics": false}))
        .expect("set");
    let web = workspace.projects_mut().get_mut("web").expect("web");
    web.set_root("apps/web");
    web.targets_mut()
        .get_mut("build")
        .expect("build")
        .set_option("outputPath", Some(json!("dist/web")));
    assert!(!workspace.has_changes());
}

#[test]
fn array_edits_replace_the_whole_array() {
    let host = host_with(
        r#"{"version": 1, "cli": {"warnings": ["a", "b"]}, "projects": {}}"#,
    );
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace
        .extensions_mut()
        .set_path(
            &["cli".into(), "warnings".into(), Segment::Index(1)],
            Some(json!("c")),
        )
        .expect("set element");
    {
        let journal = workspace.journal().expect("journal");
        let entry = journal.iter().next().expect("entry");
        assert_eq!(entry.path.to_string(), "/cli/warnings");
        assert_eq!(entry.value, Some(json!(["a", "c"])));
    }

    write_workspace(&workspace, &host, None).expect("write");
    assert_eq!(
        parse(&written(&host)).expect("reparse")["cli"],
        json!({"warnings": ["a", "c"]})
    );
}

#[test]
fn deep_writes_through_scalars_replace_the_scalar() {
    let host = host_with(r#"{"version":1,"cli":{"x":1}}"#);
    let mut workspace = read_workspace(PATH, &host).expect("read");
    workspace
        .extensions_mut()
        .set_path(&["cli".into(), "x".into(), "y".into()], Some(json!(2)))
        .expect("deep set");
    assert_eq!(
        workspace.extensions().get("cli"),
        Some(&json!({"x": {"y": 2}}))
    );

    write_workspace(&workspace, &host, None).expect("first write");
    write_workspace(&workspace, &host, None).expect("second write");
    assert_eq!(
        parse(&written(&host)).expect("reparse"),
        json!({"version": 1, "cli": {"x": {"y": 2}}})
    );
}

#[test]
fn fresh_workspace_serializes_from_scratch() {
    let mut workspace = WorkspaceDefinition::new();
    let host = MemoryHost::new();
    WorkspaceWriter::new(&host)
        .path(PATH)
        .write(&workspace)
        .expect("write empty");
    assert_eq!(
        written(&host),
        "{\n  \"$schema\": \"./node_modules/wsconf/schema.json\",\n  \"version\": 1\n}\n"
    );

    workspace
        .extensions_mut()
        .insert("newProjectRoot", json!("apps"))
        .expect("extension");
    let mut web = ProjectDefinition::new("apps/web");
    web.set_prefix(Some("web"));
    web.targets_mut()
        .add(
            "build",
            TargetDraft::new("tool:build")
                .option("outputPath", json!("dist"))
                .default_configuration("production")
                .build(),
        )
        .expect("target");
    workspace.projects_mut().add("web", web).expect("project");

    WorkspaceWriter::new(&host)
        .path(PATH)
        .schema("https://example.com/schema.json")
        .write(&workspace)
        .expect("write");
    let text = written(&host);
    assert!(text.ends_with("}\n"));
    assert_eq!(
        parse(&text).expect("reparse"),
        json!({
            "$schema": "https://example.com/schema.json",
            "version": 1,
            "newProjectRoot": "apps",
            "projects": {
                "web": {
                    "root": "apps/web",
                    "prefix": "web",
                    "targets": {
                        "build": {
                            "builder": "tool:build",
                            "defaultConfiguration": "production",
                            "options": {"outputPath": "dist"}
                        }
                    }
                }
            }
        })
    );
}

#[test]
fn fresh_workspace_requires_a_path() {
    let workspace = WorkspaceDefinition::new();
    let host = MemoryHost::new();
    assert!(matches!(
        write_workspace(&workspace, &host, None),
        Err(WorkspaceError::PathRequired)
    ));
    assert!(matches!(
        write_workspace(&workspace, &host, Some("/repo/workspace.yaml".as_ref())),
        Err(WorkspaceError::UnsupportedFormat { .. })
    ));
    assert_eq!(host.write_count(), 0);
}

#[test]
fn loaded_workspace_can_be_saved_elsewhere() {
    let host = host_with(COMMENTED);
    let workspace = read_workspace(PATH, &host).expect("read");
    write_workspace(&workspace, &host, Some("/copy/workspace.json".as_ref())).expect("write");
    assert_eq!(host.file("/copy/workspace.json").expect("copy"), COMMENTED);
}
