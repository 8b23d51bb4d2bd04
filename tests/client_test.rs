mod helpers;

use std::net::IpAddr;

use descent::{
    ClientOptions, DnsClient, Error, Message, Question, RecordClass, RecordType, ResponseCode,
};
use helpers::{
    MockNameServer, Reply, a, aaaa, answer, cname, fast_options, mx, negative, ptr, qname, qtype,
    rcode,
};

/// `c0.chain.test -> c1.chain.test -> ... -> c{links}.chain.test A`, one
/// link per response.
async fn chain_server(links: usize) -> MockNameServer {
    MockNameServer::start(move |req, _| {
        let name = qname(req);
        let n: usize = name
            .strip_prefix('c')
            .and_then(|rest| rest.strip_suffix(".chain.test"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(usize::MAX);

        if n < links {
            answer(req, vec![cname(&name, &format!("c{}.chain.test", n + 1))])
        } else if n == links {
            answer(req, vec![a(&name, "192.0.2.80")])
        } else {
            rcode(req, ResponseCode::NameError)
        }
    })
    .await
}

fn client(server: &MockNameServer) -> DnsClient {
    DnsClient::new(vec![server.name_server()], fast_options())
}

fn ipv6_client(server: &MockNameServer) -> DnsClient {
    let options = ClientOptions {
        prefer_ipv6: true,
        ..fast_options()
    };
    DnsClient::new(vec![server.name_server()], options)
}

#[tokio::test]
async fn test_cname_chain_below_limit_is_followed() {
    let server = chain_server(15).await;
    let addresses = client(&server).resolve_ip("c0.chain.test").await.unwrap();

    assert_eq!(addresses, vec!["192.0.2.80".parse::<IpAddr>().unwrap()]);
    assert_eq!(server.query_count(), 16);
}

#[tokio::test]
async fn test_cname_chain_at_limit_has_no_answer() {
    let server = chain_server(16).await;
    let result = client(&server).resolve_ip("c0.chain.test").await;

    assert!(matches!(result, Err(Error::NoAnswer(name)) if name == "c0.chain.test"));
}

#[tokio::test]
async fn test_cname_and_target_in_one_response() {
    let server = MockNameServer::start(|req, _| {
        answer(
            req,
            vec![
                cname("www.example.test", "web.example.test"),
                a("web.example.test", "192.0.2.1"),
                a("web.example.test", "192.0.2.2"),
            ],
        )
    })
    .await;

    let addresses = client(&server).resolve_ip("www.example.test").await.unwrap();
    assert_eq!(addresses.len(), 2);
    assert_eq!(server.query_count(), 1);
}

#[tokio::test]
async fn test_ipv6_falls_back_to_ipv4() {
    let server = MockNameServer::start(|req, _| match qtype(req) {
        RecordType::Aaaa => negative(req, "example.test"),
        _ => answer(req, vec![a("www.example.test", "192.0.2.1")]),
    })
    .await;

    let addresses = ipv6_client(&server).resolve_ip("www.example.test").await.unwrap();

    assert_eq!(addresses, vec!["192.0.2.1".parse::<IpAddr>().unwrap()]);
    let types: Vec<_> = server.queries().into_iter().map(|(q, _)| q.qtype).collect();
    assert_eq!(types, [RecordType::Aaaa, RecordType::A]);
}

#[tokio::test]
async fn test_ipv6_answer_is_used() {
    let server =
        MockNameServer::start(|req, _| answer(req, vec![aaaa("www.example.test", "2001:db8::1")]))
            .await;

    let addresses = ipv6_client(&server).resolve_ip("www.example.test").await.unwrap();
    assert_eq!(addresses, vec!["2001:db8::1".parse::<IpAddr>().unwrap()]);
}

#[tokio::test]
async fn test_mixed_address_families_are_accepted() {
    let server = MockNameServer::start(|req, _| {
        answer(
            req,
            vec![a("www.example.test", "192.0.2.1"), aaaa("www.example.test", "2001:db8::1")],
        )
    })
    .await;

    let from_aaaa = ipv6_client(&server).resolve_ip("www.example.test").await.unwrap();
    let from_a = client(&server).resolve_ip("www.example.test").await.unwrap();

    let expected: Vec<IpAddr> = vec!["192.0.2.1".parse().unwrap(), "2001:db8::1".parse().unwrap()];
    assert_eq!(from_aaaa, expected);
    assert_eq!(from_a, expected);
}

#[tokio::test]
async fn test_unexpected_record_type_names_server() {
    let server =
        MockNameServer::start(|req, _| answer(req, vec![mx("www.example.test", 10, "mx.test")]))
            .await;
    let result = client(&server).resolve_ip("www.example.test").await;

    match result {
        Err(Error::UnexpectedRecordType {
            server: name,
            rtype,
            domain,
        }) => {
            assert!(name.contains(&server.addr().to_string()));
            assert_eq!(rtype, RecordType::Mx);
            assert_eq!(domain, "www.example.test");
        }
        other => panic!("expected unexpected record type, got {:?}", other),
    }
}

#[tokio::test]
async fn test_nxdomain_is_name_does_not_exist() {
    let server = MockNameServer::start(|req, _| rcode(req, ResponseCode::NameError)).await;
    let result = client(&server).resolve_ip("missing.example.test").await;

    assert!(matches!(
        result,
        Err(Error::NameDoesNotExist { domain, .. }) if domain == "missing.example.test"
    ));
}

#[tokio::test]
async fn test_mx_sorted_by_preference_keeps_order() {
    let server = MockNameServer::start(|req, _| {
        answer(
            req,
            vec![
                mx("example.test", 20, "b.example.test"),
                mx("example.test", 10, "a.example.test"),
                mx("example.test", 20, "c.example.test"),
                mx("example.test", 10, "d.example.test"),
            ],
        )
    })
    .await;

    let exchanges = client(&server).resolve_mx("example.test", false).await.unwrap();
    assert_eq!(
        exchanges,
        ["a.example.test", "d.example.test", "b.example.test", "c.example.test"]
    );
}

#[tokio::test]
async fn test_mx_address_resolution() {
    let server = MockNameServer::start(|req, _| match (qname(req).as_str(), qtype(req)) {
        ("example.test", RecordType::Mx) => {
            let Reply::Message(mut response) = answer(
                req,
                vec![
                    mx("example.test", 10, "glued.example.test"),
                    mx("example.test", 20, "plain.example.test"),
                    mx("example.test", 30, "gone.example.test"),
                    mx("example.test", 40, "broken.example.test"),
                    mx("example.test", 50, "empty.example.test"),
                ],
            ) else {
                unreachable!()
            };
            response.additional.push(a("glued.example.test", "192.0.2.10"));
            Reply::Message(response)
        }
        ("plain.example.test", RecordType::A) => {
            answer(req, vec![a("plain.example.test", "192.0.2.20")])
        }
        ("gone.example.test", _) => rcode(req, ResponseCode::NameError),
        ("empty.example.test", _) => negative(req, "example.test"),
        _ => rcode(req, ResponseCode::ServerFailure),
    })
    .await;

    let resolved = client(&server).resolve_mx("example.test", true).await.unwrap();
    assert_eq!(resolved, ["192.0.2.10", "192.0.2.20", "broken.example.test"]);
}

#[tokio::test]
async fn test_mx_of_ip_literal_is_unchanged() {
    let client = DnsClient::new(Vec::new(), fast_options());
    let resolved = client.resolve_mx("192.0.2.25", true).await.unwrap();
    assert_eq!(resolved, ["192.0.2.25"]);
}

#[tokio::test]
async fn test_ptr_lookup() {
    let server = MockNameServer::start(|req, _| match qname(req).as_str() {
        "1.2.0.192.in-addr.arpa" => {
            answer(req, vec![ptr("1.2.0.192.in-addr.arpa", "host.example.test")])
        }
        _ => negative(req, "in-addr.arpa"),
    })
    .await;
    let client = client(&server);

    let name = client.resolve_ptr("192.0.2.1".parse().unwrap()).await.unwrap();
    assert_eq!(name.as_deref(), Some("host.example.test"));

    let absent = client.resolve_ptr("192.0.2.2".parse().unwrap()).await.unwrap();
    assert_eq!(absent, None);
    assert_eq!(server.queries()[0].0.qtype, RecordType::Ptr);
}

#[tokio::test]
async fn test_resolve_keeps_request_id() {
    let server =
        MockNameServer::start(|req, _| answer(req, vec![a("example.test", "192.0.2.1")])).await;
    let request = Message::request(Question::new("example.test", RecordType::A, RecordClass::In));

    let response = client(&server).resolve(&request).await.unwrap();

    assert_eq!(response.id(), request.id());
    assert_eq!(response.answer.len(), 1);
}
