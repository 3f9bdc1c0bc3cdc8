//! 翻译管道集成测试
//!
//! 通过模拟上游验证冻结/解冻、提示词、会话记忆、密钥轮换与术语收集的端到端行为

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llm_translate_proxy::translation::collaborators::{RegexRuleSet, RuleEntry};
use llm_translate_proxy::translation::core::EngineStats;
use llm_translate_proxy::translation::{ProxyConfig, RetryOutcome, RetryPolicy, ServerEvent};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{
    completion_body, drain_events, log_lines, mount_reply, received_auth_headers, received_bodies, roles_and_contents,
    test_config, EngineBuilder, RecordingGlossary,
};

/// 测试占位符往返：冻结后发往上游，解冻后无占位符残留
#[tokio::test]
async fn test_end_to_end_placeholder_round_trip() {
    let server = MockServer::start().await;
    mount_reply(&server, "<tl>嗨 [T_0]  [T_1] </tl>").await;

    let (engine, _) = EngineBuilder::new(test_config(&server)).build();
    let outcome = engine.translate("Hi\n{{name}}", "127.0.0.1").await;

    assert_eq!(outcome, RetryOutcome::Success("嗨\n{{name}}".to_string()));

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let messages = roles_and_contents(&bodies[0]);
    let (role, content) = messages.last().unwrap();
    assert_eq!(role, "user");
    assert_eq!(content, "Translate: Hi [T_0]  [T_1] ");
    assert_eq!(bodies[0]["model"], "test-model");

    println!("✅ 占位符往返正常: {:?}", outcome);
}

/// 测试模型改动空白时仍能还原占位符
#[tokio::test]
async fn test_model_whitespace_is_absorbed() {
    let server = MockServer::start().await;
    mount_reply(&server, "第一行[T_0]第二行 [T_1]").await;

    let (engine, _) = EngineBuilder::new(test_config(&server)).build();
    let result = engine
        .translate("Line one\\nLine two<br>", "127.0.0.1")
        .await
        .into_text();

    assert_eq!(result, "第一行\\n第二行<br>");
    assert!(!result.contains("[T_"));
    println!("✅ 空白吸收正常: {}", result);
}

/// 测试系统提示词包含固定规则块
#[tokio::test]
async fn test_system_prompt_carries_rules() {
    let server = MockServer::start().await;
    mount_reply(&server, "你好").await;

    let (engine, glossary) = EngineBuilder::new(test_config(&server)).build();
    engine.translate("Hello", "127.0.0.1").await;

    let bodies = received_bodies(&server).await;
    let messages = roles_and_contents(&bodies[0]);
    assert_eq!(messages[0].0, "system");
    assert!(messages[0].1.starts_with("You translate game text."));
    assert!(messages[0].1.contains("[T_0]"));
    assert!(messages[0].1.contains("ZMCZ"));
    assert!(!messages[0].1.contains("<tl>"));

    // 术语表未启用时不查询
    assert!(glossary.queries().is_empty());
    println!("✅ 系统提示词正常");
}

/// 测试术语收集：恰好一次 add_new_term("world", "世界")，返回 <tl> 的内容
#[tokio::test]
async fn test_term_harvesting() {
    let server = MockServer::start().await;
    mount_reply(&server, "<tl>Hello world</tl><tm>world=世界</tm>").await;

    let config = ProxyConfig {
        enable_glossary: true,
        ..test_config(&server)
    };
    let (engine, glossary) = EngineBuilder::new(config)
        .glossary(RecordingGlossary::with_hint("【Glossary】:\nhello = 你好\n"))
        .build();
    let mut events = engine.events().subscribe();

    let outcome = engine.translate("Hello world", "127.0.0.1").await;

    assert_eq!(outcome, RetryOutcome::Success("Hello world".to_string()));
    assert_eq!(glossary.added(), vec![("world".to_string(), "世界".to_string())]);
    assert_eq!(glossary.queries(), vec!["Hello world".to_string()]);

    let bodies = received_bodies(&server).await;
    let system = &roles_and_contents(&bodies[0])[0].1;
    assert!(system.contains("【Glossary】:\nhello = 你好"));
    assert!(system.contains("<tm>Src=Trgt</tm>"));

    let lines = log_lines(&drain_events(&mut events));
    assert!(lines.iter().any(|line| line.contains("New Term Discovered: world = 世界")));
    assert_eq!(EngineStats::get(&engine.stats().harvested_terms), 1);
    assert!(engine.stats().summary().ends_with("terms=1"));
    println!("✅ 术语收集正常: {:?}", glossary.added());
}

/// 测试被拒绝的术语对不会入库
#[tokio::test]
async fn test_rejected_terms_are_not_stored() {
    let server = MockServer::start().await;
    mount_reply(
        &server,
        "<tl>你好 ZMCZ</tl><tm>ZMCZ=某人</tm><tm>[T_0]=x</tm><tm>moon=月亮</tm><tm>=空</tm>",
    )
    .await;

    let config = ProxyConfig {
        enable_glossary: true,
        ..test_config(&server)
    };
    let (engine, glossary) = EngineBuilder::new(config).build();

    let result = engine.translate("Hello ZMCZ friend", "127.0.0.1").await.into_text();

    assert_eq!(result, "你好 ZMCZ");
    assert!(glossary.added().is_empty());
    println!("✅ 无效术语已过滤");
}

/// 测试会话记忆：同一客户端的历史按顺序进入提示词，并受深度限制
#[tokio::test]
async fn test_session_history_is_bounded() {
    let server = MockServer::start().await;
    mount_reply(&server, "译文").await;

    let config = ProxyConfig {
        context_num: 2,
        ..test_config(&server)
    };
    let (engine, _) = EngineBuilder::new(config).build();

    for text in ["one", "two", "three", "four"] {
        assert!(engine.translate(text, "10.0.0.1").await.is_success());
    }
    // 另一个客户端没有历史
    engine.translate("other", "10.0.0.2").await;

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 5);

    let fourth = roles_and_contents(&bodies[3]);
    let history: Vec<&str> = fourth[1..fourth.len() - 1].iter().map(|(_, c)| c.as_str()).collect();
    assert_eq!(history, vec!["Translate: two", "译文", "Translate: three", "译文"]);

    let other = roles_and_contents(&bodies[4]);
    assert_eq!(other.len(), 2);

    engine.clear_sessions();
    assert!(engine.sessions().is_empty());
    println!("✅ 会话记忆受限且隔离");
}

/// 测试密钥在请求之间轮换
#[tokio::test]
async fn test_credentials_rotate_across_requests() {
    let server = MockServer::start().await;
    mount_reply(&server, "好").await;

    let config = ProxyConfig {
        api_key: "k1, k2,,k3".to_string(),
        ..test_config(&server)
    };
    let (engine, _) = EngineBuilder::new(config).build();

    for _ in 0..4 {
        engine.translate("Hello", "127.0.0.1").await;
    }

    assert_eq!(
        received_auth_headers(&server).await,
        vec!["Bearer k1", "Bearer k2", "Bearer k3", "Bearer k1"]
    );
    println!("✅ 密钥轮换正常");
}

/// 测试热更新：新配置只影响之后的尝试
#[tokio::test]
async fn test_hot_reload_applies_to_next_request() {
    let server = MockServer::start().await;
    mount_reply(&server, "好").await;

    let config = test_config(&server);
    let (engine, glossary) = EngineBuilder::new(config.clone()).build();
    engine.translate("Hello", "127.0.0.1").await;

    engine.update_config(ProxyConfig {
        model_name: "second-model".to_string(),
        api_key: "fresh".to_string(),
        enable_glossary: true,
        glossary_path: "/tmp/terms.json".to_string(),
        ..config
    });
    engine.translate("Hello", "127.0.0.1").await;

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies[0]["model"], "test-model");
    assert_eq!(bodies[1]["model"], "second-model");
    assert_eq!(received_auth_headers(&server).await[1], "Bearer fresh");
    assert_eq!(*glossary.paths.lock().unwrap(), vec!["/tmp/terms.json".to_string()]);
    assert_eq!(engine.config_snapshot().glossary_history, vec!["/tmp/terms.json".to_string()]);
    println!("✅ 配置热更新正常");
}

/// 测试重试等待期间的热更新会被下一次尝试读到
#[tokio::test]
async fn test_hot_reload_during_retry_delay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Error")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_reply(&server, "好").await;

    let config = test_config(&server);
    let policy = RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_millis(400),
        slice: Duration::from_millis(10),
    };
    let (engine, _) = EngineBuilder::new(config.clone()).policy(policy).build();
    let engine = Arc::new(engine);

    let reloader = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            engine.update_config(ProxyConfig {
                model_name: "second-model".to_string(),
                ..config
            });
        })
    };

    let outcome = engine.translate("Hello", "127.0.0.1").await;
    reloader.await.unwrap();

    assert_eq!(outcome, RetryOutcome::Success("好".to_string()));
    let models: Vec<_> = received_bodies(&server)
        .await
        .iter()
        .map(|body| body["model"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(models, vec!["test-model", "second-model"]);
    println!("✅ 重试期间热更新生效: {:?}", models);
}

/// 测试预处理与后处理只在术语表模式下生效
#[tokio::test]
async fn test_rule_engine_runs_in_glossary_mode() {
    let server = MockServer::start().await;
    mount_reply(&server, "<tl>嗨，朋友</tl>").await;

    let rules = RegexRuleSet::new(
        vec![RuleEntry {
            pattern: "Hi".to_string(),
            replacement: "Hello".to_string(),
        }],
        vec![RuleEntry {
            pattern: "嗨".to_string(),
            replacement: "你好".to_string(),
        }],
    )
    .unwrap();

    let config = ProxyConfig {
        enable_glossary: true,
        ..test_config(&server)
    };
    let (engine, _) = EngineBuilder::new(config).rules(Arc::new(rules)).build();

    let result = engine.translate("Hi friend", "127.0.0.1").await.into_text();
    assert_eq!(result, "你好，朋友");

    let bodies = received_bodies(&server).await;
    let user = roles_and_contents(&bodies[0]).last().unwrap().1.clone();
    assert_eq!(user, "Translate: Hello friend");
    println!("✅ 规则引擎正常: {}", result);
}

/// 测试 Token 用量事件与推理块剥离
#[tokio::test]
async fn test_token_usage_and_think_block() {
    let server = MockServer::start().await;
    mount_reply(&server, "<think>\nreasoning...\n</think>\n你好").await;

    let (engine, _) = EngineBuilder::new(test_config(&server)).build();
    let mut events = engine.events().subscribe();

    let result = engine.translate("Hello", "127.0.0.1").await.into_text();
    assert_eq!(result, "你好");

    let events = drain_events(&mut events);
    assert!(events.contains(&ServerEvent::TokenUsage {
        prompt: 10,
        completion: 5
    }));
    println!("✅ Token 用量事件正常");
}
