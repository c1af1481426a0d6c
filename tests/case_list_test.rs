//! Tests for CaseListService

use std::path::PathBuf;

use tempfile::TempDir;

use mindtab::application::services::{CaseList, CaseStep, ExportRequest};
use mindtab::application::ApplicationError;
use mindtab::config::Settings;
use mindtab::domain::{DomainError, Forest, Node, RootTagPolicy, Sheet, TagFilter, TagId};
use mindtab::infrastructure::di::ServiceContainer;
use mindtab::infrastructure::traits::DocumentLoader;
use mindtab::infrastructure::JsonDocumentLoader;
use mindtab::util::testing;

fn resource(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(name)
}

fn tags(ids: &[&str]) -> Vec<TagId> {
    ids.iter().map(|t| TagId::from(*t)).collect()
}

fn selection() -> TagFilter {
    TagFilter::new(
        tags(&["priority-1", "priority-2", "flag-red", "star-yellow"]),
        RootTagPolicy::DropSheet,
    )
    .unwrap()
}

fn step(step: usize, action: &str, expected: &str) -> CaseStep {
    CaseStep {
        step,
        action: action.to_string(),
        expected: expected.to_string(),
    }
}

fn paths(list: &CaseList) -> Vec<&str> {
    list.cases().iter().map(|c| c.test_path.as_str()).collect()
}

/// App
/// ├── 用户登录 [p1]: 输入账号, 点击登录, (untitled)
/// ├── 注册 [p2]                       too short
/// ├── 环境配置检查 [p1]                setup work
/// ├── 订单
/// │   └── 创建订单 [p2]
/// ├── 支付流程 [flag-red]
/// ├── 深层 > 三层 > 四层 > 五层 > 六层节点 > 第七层节点 [p1]   too deep
/// └── 搜索商品测试 [star-yellow]: 12 steps
/// second sheet repeats App > 用户登录
fn shop() -> Forest {
    let mut search = Node::new("搜索商品测试")
        .with_tag("star-yellow")
        .with_child(Node::new("查询商品"))
        .with_child(Node::new("删除记录"));
    for i in 3..=12 {
        search = search.with_child(Node::new(format!("步骤{i}")));
    }

    let mut deep = Node::new("第七层节点").with_tag("priority-1");
    for title in ["六层节点", "五层", "四层", "三层", "深层"] {
        deep = Node::new(title).with_child(deep);
    }

    let app = Node::new("App")
        .with_child(
            Node::new("用户登录")
                .with_tag("priority-1")
                .with_child(Node::new("输入账号"))
                .with_child(Node::new("点击登录"))
                .with_child(Node::new("")),
        )
        .with_child(Node::new("注册").with_tag("priority-2"))
        .with_child(Node::new("环境配置检查").with_tag("priority-1"))
        .with_child(Node::new("订单").with_child(Node::new("创建订单").with_tag("priority-2")))
        .with_child(Node::new("支付流程").with_tag("flag-red"))
        .with_child(deep)
        .with_child(search);

    let copy = Node::new("App").with_child(Node::new("用户登录").with_tag("priority-2"));

    Forest::new(vec![Sheet::new("Shop", app), Sheet::new("Copy", copy)])
}

#[test]
fn given_tagged_forest_when_building_cases_then_selects_numbers_and_describes_them() {
    // Arrange
    testing::init_test_setup();
    let container = ServiceContainer::new(Settings::default());

    // Act
    let list = container
        .case_list_service()
        .build_from_forest("shop.json", &shop(), &selection());

    // Assert: too short, setup work, too deep and the duplicate path are skipped
    assert_eq!(
        paths(&list),
        vec![
            "App > 用户登录",
            "App > 订单 > 创建订单",
            "App > 支付流程",
            "App > 搜索商品测试"
        ]
    );
    let ids: Vec<&str> = list.cases().iter().map(|c| c.case_id.as_str()).collect();
    assert_eq!(ids, vec!["SMOKE_001", "SMOKE_002", "SMOKE_003", "SMOKE_004"]);

    let login = &list.cases()[0];
    assert_eq!(login.title, "用户登录功能验证");
    assert_eq!(login.module, "用户登录");
    assert_eq!(login.priority, "P1");
    assert_eq!(login.markers, tags(&["priority-1"]));
    assert_eq!(
        login.steps,
        vec![step(1, "输入账号", "操作成功完成"), step(2, "点击登录", "成功登录系统")]
    );
    assert!(login.smoke_criteria.is_core_function);
    assert!(login.smoke_criteria.affects_main_flow);
    assert_eq!(login.smoke_criteria.execution_time, "< 2分钟");

    let order = &list.cases()[1];
    assert_eq!(order.title, "创建订单验证");
    assert_eq!(order.module, "订单");
    assert_eq!(order.priority, "P2");
    assert_eq!(order.steps, vec![step(1, "执行创建订单", "操作成功完成")]);
    assert!(!order.smoke_criteria.is_core_function);
    assert!(!order.smoke_criteria.affects_main_flow);

    let payment = &list.cases()[2];
    assert_eq!(payment.title, "支付流程功能验证");
    assert_eq!(payment.priority, "P1");
    assert_eq!(payment.steps.len(), 3);

    let search = &list.cases()[3];
    assert_eq!(search.title, "搜索商品测试");
    assert_eq!(search.steps.len(), 10);
    assert_eq!(search.steps[0], step(1, "查询商品", "返回正确的搜索结果"));
    assert_eq!(search.steps[1], step(2, "删除记录", "成功删除"));
    assert_eq!(search.steps[9].action, "步骤10");
    assert!(search.smoke_criteria.is_core_function);
    assert!(!search.smoke_criteria.affects_main_flow);

    let meta = &list.smoke_test_suite.metadata;
    assert_eq!(meta.source_file, "shop.json");
    assert_eq!(meta.total_cases, 4);
    assert_eq!(
        meta.selected_markers,
        tags(&["flag-red", "priority-1", "priority-2", "star-yellow"])
    );
    assert!(meta.export_time.contains('T'));
}

#[test]
fn given_custom_case_rules_when_building_then_level_range_and_step_cap_follow_settings() {
    let mut settings = Settings::default();
    settings.cases.max_level = 2;
    settings.cases.max_steps = 1;
    settings.cases.exclude_keywords = vec!["支付".to_string()];
    let container = ServiceContainer::new(settings);

    let list = container
        .case_list_service()
        .build_from_forest("shop.json", &shop(), &selection());

    assert_eq!(
        paths(&list),
        vec!["App > 用户登录", "App > 环境配置检查", "App > 搜索商品测试"]
    );
    assert_eq!(list.cases()[0].steps, vec![step(1, "输入账号", "操作成功完成")]);
    assert_eq!(list.cases()[2].steps.len(), 1);
}

#[test]
fn given_document_when_building_cases_then_tagged_root_sheet_follows_policy() {
    let container = ServiceContainer::new(Settings::default());
    let service = container.case_list_service();
    let selected = tags(&["priority-1", "priority-2"]);

    let dropped = service
        .build(&resource("suite_content.json"), &selected, RootTagPolicy::DropSheet)
        .unwrap();
    let retained = service
        .build(&resource("suite_content.json"), &selected, RootTagPolicy::Retain)
        .unwrap();

    assert_eq!(
        paths(&dropped),
        vec!["Suite > Login", "Suite > Register > EmailReg"]
    );
    // the level-1 root itself never becomes a case
    assert_eq!(
        paths(&retained),
        vec!["Suite > Login", "Suite > Register > EmailReg", "Everything > Inner"]
    );
    let login = &dropped.cases()[0];
    assert_eq!(login.title, "Login验证");
    assert_eq!(
        login.steps,
        vec![step(1, "UserPass", "操作成功完成"), step(2, "Captcha", "操作成功完成")]
    );
    assert_eq!(dropped.smoke_test_suite.metadata.source_file, "suite_content.json");
}

#[test]
fn given_no_tagged_candidate_when_building_then_list_is_empty() {
    let container = ServiceContainer::new(Settings::default());

    let list = container
        .case_list_service()
        .build(&resource("suite_content.json"), &tags(&["star-red"]), RootTagPolicy::DropSheet)
        .unwrap();

    assert!(list.is_empty());
    assert_eq!(list.smoke_test_suite.metadata.total_cases, 0);
}

#[test]
fn given_empty_selection_when_building_cases_then_returns_domain_error() {
    let container = ServiceContainer::new(Settings::default());

    let result = container.case_list_service().build(
        &resource("suite_content.json"),
        &[],
        RootTagPolicy::DropSheet,
    );

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::EmptySelection))
    ));
}

#[test]
fn given_written_case_list_when_reloading_then_cases_export_reads_it_back() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("out/shop.cases.json");
    let container = ServiceContainer::new(Settings::default());
    let service = container.case_list_service();
    let list = service.build_from_forest("shop.json", &shop(), &selection());

    // Act
    service.write(&list, &target).unwrap();
    let written = std::fs::read_to_string(&target).unwrap();
    let records = JsonDocumentLoader::default()
        .load_cases("shop.cases.json", &written)
        .unwrap();
    let outcome = container
        .export_service()
        .export_cases(
            &target,
            &ExportRequest::new(tags(&["priority-2"]), &Settings::default()),
        )
        .unwrap();

    // Assert
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["smoke_test_suite"]["metadata"]["total_cases"], 4);
    assert_eq!(value["smoke_test_suite"]["test_cases"][0]["case_id"], "SMOKE_001");
    assert_eq!(value["smoke_test_suite"]["test_cases"][0]["steps"][1]["expected"], "成功登录系统");

    let reloaded: Vec<Vec<String>> = records.iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        reloaded,
        vec![
            vec!["App", "用户登录"],
            vec!["App", "订单", "创建订单"],
            vec!["App", "支付流程"],
            vec!["App", "搜索商品测试"],
        ]
    );
    assert!(records[2].has_tag("flag-red"));
    assert_eq!(outcome.plan.rows.len(), 1);
}
