use crate::{Index, IndexError, Reader};
use ingress_policy_core::{
    ingress_traffic_policy, ApiVersion, AppProtocol, Diagnostic, IngressProvider, MeshService,
    PathMatch, PolicyConfig, PortProtocolResolver,
};
use ingress_policy_k8s_api::{
    networking_v1 as v1, networking_v1beta1 as v1beta1, IntOrString, ObjectMeta, Service,
    ServicePort, ServiceSpec,
};
use kubert::index::IndexNamespacedResource;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use std::num::NonZeroU16;

struct TestConfig {
    index: Index,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::serving(ApiVersion::ALL)
    }
}

impl TestConfig {
    fn serving(versions: impl IntoIterator<Item = ApiVersion>) -> Self {
        let _tracing = tracing::subscriber::set_default(
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(tracing::Level::TRACE)
                .finish(),
        );
        Self {
            index: Index::new(versions),
            _tracing,
        }
    }
}

fn mk_svc(name: &str) -> MeshService {
    MeshService::new(name, "ns-0", "cluster.local")
}

fn mk_meta(ns: impl ToString, name: impl ToString) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn mk_service(ns: &str, name: &str, ports: impl IntoIterator<Item = (&'static str, i32)>) -> Service {
    Service {
        metadata: mk_meta(ns, name),
        spec: Some(ServiceSpec {
            ports: Some(
                ports
                    .into_iter()
                    .map(|(name, port)| ServicePort {
                        name: Some(name.to_string()),
                        port,
                        target_port: Some(IntOrString::Int(port)),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn v1_backend(svc: &str) -> v1::IngressBackend {
    v1::IngressBackend {
        service: Some(v1::IngressServiceBackend {
            name: svc.to_string(),
            port: None,
        }),
        resource: None,
    }
}

fn mk_ingress_v1(
    ns: &str,
    name: &str,
    host: &str,
    paths: impl IntoIterator<Item = (&'static str, &'static str, &'static str)>,
) -> v1::Ingress {
    v1::Ingress {
        metadata: mk_meta(ns, name),
        spec: Some(v1::IngressSpec {
            rules: Some(vec![v1::IngressRule {
                host: Some(host.to_string()),
                http: Some(v1::HTTPIngressRuleValue {
                    paths: paths
                        .into_iter()
                        .map(|(path, path_type, svc)| v1::HTTPIngressPath {
                            path: Some(path.to_string()),
                            path_type: path_type.to_string(),
                            backend: v1_backend(svc),
                        })
                        .collect(),
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mk_ingress_v1beta1(ns: &str, name: &str, default_backend: &str) -> v1beta1::Ingress {
    let mut ingress = v1beta1::Ingress::new(
        name,
        v1beta1::IngressSpec {
            backend: Some(v1beta1::IngressBackend {
                service_name: Some(default_backend.to_string()),
                service_port: Some(IntOrString::Int(80)),
                resource: None,
            }),
            ..Default::default()
        },
    );
    ingress.metadata.namespace = Some(ns.to_string());
    ingress
}

fn names(ingresses: Vec<ingress_policy_core::IngressObject>) -> Vec<String> {
    ingresses.into_iter().map(|i| i.name).collect()
}

#[test]
fn lists_ingresses_referencing_service() {
    let mut test = TestConfig::default();
    test.index.apply(mk_ingress_v1("ns-0", "ingress-b", "a.com", [("/", "Prefix", "svc-0")]));
    test.index.apply(mk_ingress_v1("ns-0", "ingress-a", "b.com", [("/", "Prefix", "svc-0")]));
    test.index.apply(mk_ingress_v1("ns-0", "ingress-c", "a.com", [("/", "Prefix", "svc-1")]));
    test.index.apply(mk_ingress_v1("ns-1", "ingress-d", "a.com", [("/", "Prefix", "svc-0")]));
    test.index.apply(mk_ingress_v1beta1("ns-0", "ingress-e", "svc-0"));

    let v1 = test.index.list_ingresses(ApiVersion::V1, &mk_svc("svc-0")).unwrap();
    assert_eq!(names(v1), vec!["ingress-a", "ingress-b"]);

    let v1beta1 = test
        .index
        .list_ingresses(ApiVersion::V1beta1, &mk_svc("svc-0"))
        .unwrap();
    assert_eq!(names(v1beta1), vec!["ingress-e"]);

    let other = test.index.list_ingresses(ApiVersion::V1, &mk_svc("svc-1")).unwrap();
    assert_eq!(names(other), vec!["ingress-c"]);

    let none = test.index.list_ingresses(ApiVersion::V1, &mk_svc("svc-2")).unwrap();
    assert!(none.is_empty());
}

#[test]
fn deleted_ingresses_are_not_listed() {
    let mut test = TestConfig::default();
    test.index.apply(mk_ingress_v1("ns-0", "ingress-0", "a.com", [("/", "Prefix", "svc-0")]));
    test.index.apply(mk_ingress_v1beta1("ns-0", "ingress-0", "svc-0"));

    IndexNamespacedResource::<v1::Ingress>::delete(
        &mut test.index,
        "ns-0".to_string(),
        "ingress-0".to_string(),
    );
    assert!(test
        .index
        .list_ingresses(ApiVersion::V1, &mk_svc("svc-0"))
        .unwrap()
        .is_empty());

    // Deleting one version leaves the other in place.
    let v1beta1 = test
        .index
        .list_ingresses(ApiVersion::V1beta1, &mk_svc("svc-0"))
        .unwrap();
    assert_eq!(names(v1beta1), vec!["ingress-0"]);
}

#[test]
fn unserved_api_version() {
    let test = TestConfig::serving([ApiVersion::V1]);
    let error = test
        .index
        .list_ingresses(ApiVersion::V1beta1, &mk_svc("svc-0"))
        .unwrap_err();
    assert_eq!(
        error.downcast_ref::<IndexError>(),
        Some(&IndexError::ApiNotServed(ApiVersion::V1beta1))
    );
}

#[test]
fn resolves_service_ports() {
    let mut test = TestConfig::default();
    test.index
        .apply(mk_service("ns-0", "svc-0", [("http", 80), ("tcp-db", 5432)]));

    assert_eq!(
        test.index.target_port_protocols(&mk_svc("svc-0")).unwrap(),
        btreemap! {
            NonZeroU16::new(80).unwrap() => AppProtocol::Http,
            NonZeroU16::new(5432).unwrap() => AppProtocol::Tcp,
        }
    );

    let error = test
        .index
        .target_port_protocols(&mk_svc("svc-1"))
        .unwrap_err();
    assert_eq!(
        error.downcast_ref::<IndexError>(),
        Some(&IndexError::ServiceNotFound("ns-0/svc-1".to_string()))
    );

    IndexNamespacedResource::<Service>::delete(
        &mut test.index,
        "ns-0".to_string(),
        "svc-0".to_string(),
    );
    assert!(test.index.target_port_protocols(&mk_svc("svc-0")).is_err());
}

#[test]
fn builds_policy_from_both_versions() {
    let mut test = TestConfig::default();
    test.index.apply(mk_service("ns-0", "svc-0", [("http", 8080)]));
    test.index.apply(mk_ingress_v1(
        "ns-0",
        "ingress-0",
        "a.com",
        [("/foo", "Prefix", "svc-0")],
    ));
    test.index.apply(mk_ingress_v1(
        "ns-0",
        "ingress-1",
        "a.com",
        [("/bar", "Exact", "svc-0")],
    ));
    test.index.apply(mk_ingress_v1beta1("ns-0", "ingress-2", "svc-0"));

    let (reader, _index) = test.index.shared();
    let outcome = reader
        .ingress_traffic_policy(&mk_svc("svc-0"), PolicyConfig::default())
        .unwrap();
    assert_eq!(outcome.diagnostics, vec![]);

    let policy = outcome.policy.expect("policy must be built");
    assert_eq!(
        policy
            .traffic_matches
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>(),
        vec!["ingress_ns-0/svc-0_8080_http"]
    );

    let routes = policy
        .http_route_policies
        .iter()
        .map(|p| {
            (
                p.name.as_str(),
                p.hostnames.clone(),
                p.rules.iter().map(|r| r.route.path.clone()).collect::<Vec<_>>(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        routes,
        vec![
            (
                "ingress-0.ns-0|a.com",
                vec!["a.com".to_string()],
                vec![
                    PathMatch::regex("/foo(/.*)?$").unwrap(),
                    PathMatch::Exact("/bar".to_string()),
                ],
            ),
            (
                "ingress-2.ns-0|*",
                vec!["*".to_string()],
                vec![PathMatch::Prefix("/".to_string())],
            ),
        ]
    );
}

#[test]
fn unserved_versions_are_diagnosed() {
    let mut test = TestConfig::serving([]);
    test.index.apply(mk_service("ns-0", "svc-0", [("http", 8080)]));
    test.index.apply(mk_ingress_v1(
        "ns-0",
        "ingress-0",
        "a.com",
        [("/", "Prefix", "svc-0")],
    ));

    let outcome = ingress_traffic_policy(
        &mk_svc("svc-0"),
        PolicyConfig::default(),
        &test.index,
        &test.index,
    )
    .unwrap();
    assert_eq!(outcome.policy, None);
    assert_eq!(
        outcome.diagnostics.last(),
        Some(&Diagnostic::NoProviderAvailable)
    );
}

#[test]
fn concurrent_lookups() {
    let mut test = TestConfig::default();
    test.index.apply(mk_service("ns-0", "svc-0", [("http", 80)]));
    test.index.apply(mk_service("ns-0", "svc-1", [("http", 80)]));
    test.index.apply(mk_ingress_v1(
        "ns-0",
        "ingress-0",
        "a.com",
        [("/zero", "Prefix", "svc-0"), ("/one", "Prefix", "svc-1")],
    ));
    let (reader, _index) = test.index.shared();

    let config = PolicyConfig {
        https_ingress: true,
        ..Default::default()
    };
    let outcomes = std::thread::scope(|s| {
        let handles = (0..8)
            .map(|i| {
                let reader: Reader = reader.clone();
                s.spawn(move || {
                    let svc = mk_svc(if i % 2 == 0 { "svc-0" } else { "svc-1" });
                    reader.ingress_traffic_policy(&svc, config)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|h| h.join().expect("lookup must not panic"))
            .collect::<Vec<_>>()
    });

    for (i, outcome) in outcomes.into_iter().enumerate() {
        let policy = outcome.unwrap().policy.expect("policy must be built");
        assert_eq!(policy.traffic_matches.len(), 2);
        let expected = if i % 2 == 0 { "/zero(/.*)?$" } else { "/one(/.*)?$" };
        assert_eq!(
            policy.http_route_policies[0].rules[0].route.path.pattern(),
            expected
        );
    }
}

#[test]
fn lookups_read_one_index_state() {
    let test = TestConfig::default();
    let (reader, index) = test.index.shared();
    let svc = mk_svc("svc-0");

    // The writer switches between a state where both ingress versions and the
    // service exist and a state where none of them do. A lookup that observed
    // both states would see only one of the routes, or routes without ports.
    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..200 {
                {
                    let mut index = index.write();
                    index.apply(mk_service("ns-0", "svc-0", [("http", 80)]));
                    index.apply(mk_ingress_v1(
                        "ns-0",
                        "ingress-0",
                        "a.com",
                        [("/", "Prefix", "svc-0")],
                    ));
                    index.apply(mk_ingress_v1beta1("ns-0", "ingress-1", "svc-0"));
                }
                {
                    let mut index = index.write();
                    IndexNamespacedResource::<v1::Ingress>::delete(
                        &mut *index,
                        "ns-0".to_string(),
                        "ingress-0".to_string(),
                    );
                    IndexNamespacedResource::<v1beta1::Ingress>::delete(
                        &mut *index,
                        "ns-0".to_string(),
                        "ingress-1".to_string(),
                    );
                    IndexNamespacedResource::<Service>::delete(
                        &mut *index,
                        "ns-0".to_string(),
                        "svc-0".to_string(),
                    );
                }
            }
        });

        for _ in 0..200 {
            let outcome = reader
                .ingress_traffic_policy(&svc, PolicyConfig::default())
                .expect("lookup must see the service with its ingresses");
            let rules = outcome
                .policy
                .map(|p| {
                    p.http_route_policies
                        .iter()
                        .map(|p| p.rules.len())
                        .sum::<usize>()
                })
                .unwrap_or_default();
            assert!(rules == 0 || rules == 2, "saw {rules} rules");
        }
    });
}
