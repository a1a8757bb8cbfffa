//! External context adapter tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use servicekit_di::*;

#[derive(Debug)]
struct Greeting {
    name: String,
    punctuation: String,
}

impl Injectable for Greeting {
    fn parameters() -> Vec<Parameter> {
        vec![
            Parameter::value::<String>("name"),
            Parameter::untyped("punctuation").with_default(String::from("!")),
        ]
    }

    fn construct(args: &mut Arguments) -> DIResult<Self> {
        Ok(Greeting {
            name: args.value("name")?,
            punctuation: args.value("punctuation")?,
        })
    }
}

impl Greeting {
    fn render(&self) -> String {
        format!("hello {}{}", self.name, self.punctuation)
    }
}

#[test]
fn test_null_adapter_falls_through() {
    let container = DIContainerBuilder::new().adapter(NullAdapter).build();

    let err = container.resolve::<Greeting>().unwrap_err();
    assert!(matches!(err, DIError::Parameter { .. }));

    let greeting = container
        .resolve_with::<Greeting>(&Context::new().with("name", String::from("ada")))
        .unwrap();
    assert_eq!(greeting.render(), "hello ada!");
}

#[test]
fn test_fn_adapter_supplies_values() {
    let adapter = from_fn(|target: &Target<'_>| {
        let mut context = Context::new();
        if target.parameter("name").is_some() {
            context.insert("name", String::from("grace"));
        }
        Ok(context)
    });
    let container = DIContainerBuilder::new().adapter(adapter).build();

    let greeting = container.resolve::<Greeting>().unwrap();
    assert_eq!(greeting.render(), "hello grace!");
}

#[test]
fn test_adapter_overrides_defaults_and_caller_values() {
    let adapter = from_fn(|_target: &Target<'_>| {
        Ok(Context::new().with("punctuation", String::from("?")))
    });
    let container = DIContainerBuilder::new().adapter(adapter).build();

    let greeting = container
        .resolve_with::<Greeting>(
            &Context::new()
                .with("name", String::from("linus"))
                .with("punctuation", String::from(".")),
        )
        .unwrap();
    assert_eq!(greeting.render(), "hello linus?");
}

#[test]
fn test_failing_adapter_is_swallowed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let adapter = from_fn(move |_target: &Target<'_>| {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("request already consumed"))
    });
    let container = DIContainerBuilder::new().adapter(adapter).build();

    let greeting = container
        .resolve_with::<Greeting>(&Context::new().with("name", String::from("ken")))
        .unwrap();
    assert_eq!(greeting.render(), "hello ken!");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_adapter_sees_target_and_supplied_bag() {
    let adapter = from_fn(|target: &Target<'_>| {
        assert_eq!(target.name(), "Greeting");
        assert_eq!(target.key(), TypeKey::of::<Greeting>());
        assert_eq!(target.parameters().len(), 2);
        assert!(target.supplied().contains("name"));
        Ok(Context::new())
    });
    let container = DIContainerBuilder::new().adapter(adapter).build();

    container
        .resolve_with::<Greeting>(&Context::new().with("name", String::from("barbara")))
        .unwrap();
}

/// Stand-in for a web framework's request object
struct FakeRequest {
    path_params: HashMap<String, String>,
}

impl FakeRequest {
    fn with_param(name: &str, value: &str) -> Self {
        let mut path_params = HashMap::new();
        path_params.insert(name.to_string(), value.to_string());
        Self { path_params }
    }
}

struct PathParams;

#[async_trait]
impl RequestResolver<FakeRequest> for PathParams {
    async fn resolve(
        &self,
        request: &FakeRequest,
        target: &Target<'_>,
    ) -> anyhow::Result<Context> {
        tokio::task::yield_now().await;
        let mut context = Context::new();
        for parameter in target.parameters() {
            if let Some(value) = request.path_params.get(parameter.name()) {
                context.insert(parameter.name(), value.clone());
            }
        }
        Ok(context)
    }
}

struct Rejecting;

#[async_trait]
impl RequestResolver<FakeRequest> for Rejecting {
    async fn resolve(
        &self,
        _request: &FakeRequest,
        _target: &Target<'_>,
    ) -> anyhow::Result<Context> {
        anyhow::bail!("malformed body")
    }
}

#[test]
fn test_request_adapter_resolves_path_params() {
    let container = DIContainerBuilder::new()
        .adapter(RequestContextAdapter::new(PathParams))
        .build();

    let context = Context::with_request(Arc::new(FakeRequest::with_param("name", "alan")));
    let greeting = container.resolve_with::<Greeting>(&context).unwrap();
    assert_eq!(greeting.render(), "hello alan!");
}

#[test]
fn test_request_adapter_without_request() {
    let container = DIContainerBuilder::new()
        .adapter(RequestContextAdapter::new(PathParams))
        .build();

    let err = container.resolve::<Greeting>().unwrap_err();
    assert!(err.to_string().contains("parameter 'name' in Greeting"));
}

#[test]
fn test_request_adapter_failure_falls_through() {
    let container = DIContainerBuilder::new()
        .adapter(RequestContextAdapter::new(Rejecting))
        .build();

    let mut context = Context::with_request(Arc::new(FakeRequest::with_param("name", "x")));
    context.insert("name", String::from("edsger"));
    let greeting = container.resolve_with::<Greeting>(&context).unwrap();
    assert_eq!(greeting.render(), "hello edsger!");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_adapter_inside_runtime() {
    let container = DIContainerBuilder::new()
        .adapter(RequestContextAdapter::new(PathParams))
        .build();

    let context = Context::with_request(Arc::new(FakeRequest::with_param("name", "barbara")));
    let greeting = container.resolve_with::<Greeting>(&context).unwrap();
    assert_eq!(greeting.render(), "hello barbara!");
}

#[tokio::test]
async fn test_request_factory_forwards_request() {
    let container = Arc::new(
        DIContainerBuilder::new()
            .adapter(RequestContextAdapter::new(PathParams))
            .build(),
    );
    let factory = container.request_factory::<Greeting, FakeRequest>();

    let handle = tokio::task::spawn_blocking(move || {
        factory(Some(Arc::new(FakeRequest::with_param("name", "margaret"))))
            .map(|greeting| greeting.render())
    });
    let rendered = handle.await.unwrap().unwrap();
    assert_eq!(rendered, "hello margaret!");
}

#[test]
fn test_request_factory_without_request() {
    let container = Arc::new(DIContainer::new());
    let factory = container.request_factory::<Greeting, FakeRequest>();

    assert!(factory(None).is_err());
}

#[test]
fn test_request_key_is_reserved() {
    let adapter = from_fn(|target: &Target<'_>| {
        let request = target.request::<FakeRequest>();
        assert!(request.is_some());
        assert!(target.supplied().contains(REQUEST_KEY));
        Ok(Context::new().with("name", String::from("via request key")))
    });
    let container = Arc::new(DIContainerBuilder::new().adapter(adapter).build());

    let factory = container.request_factory::<Greeting, FakeRequest>();
    let greeting = factory(Some(Arc::new(FakeRequest::with_param("ignored", "")))).unwrap();
    assert_eq!(greeting.render(), "hello via request key!");
}
