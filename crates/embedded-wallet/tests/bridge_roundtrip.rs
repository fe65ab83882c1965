use alloy::primitives::{address, Address, I256, U256};
use embedded_wallet::{
    EmbedOptions, EmbeddedWallet, Erc3009Request, ErrorValue, LocalChannel, LocalConnector,
    Responder, Value, WalletError, METHOD_GET_ERC3009_SIGNATURE,
};
use std::time::Duration;

const PAY_TO: Address = address!("2222222222222222222222222222222222222222");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn options() -> EmbedOptions {
    EmbedOptions::new("https://wallet.example.com/embed").with_name("pay-frame")
}

fn echo_connector() -> LocalConnector<impl Fn(LocalChannel, &EmbedOptions) + Send + Sync> {
    LocalConnector::new(|remote: LocalChannel, options: &EmbedOptions| {
        let responder = Responder::new(remote);
        responder.handle("echo", |params: Value| async move { Ok(params) });
        // Later requests answer first.
        responder.handle("delayed", |params: Value| async move {
            let delay = params.get("delayMs").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(params)
        });
        responder.handle("fail", |_params: Value| async move {
            Err(ErrorValue::new("RangeError", "out of range").with_stack("at fail (wallet.js:7:3)"))
        });
        responder.announce(&options.name);
    })
}

#[tokio::test]
async fn test_extension_values_survive_the_bridge() {
    init_tracing();
    let wallet = EmbeddedWallet::connect(&echo_connector(), &options())
        .await
        .unwrap();

    let value = Value::object([
        ("big", Value::BigInt(I256::from_dec_str("-340282366920938463463374607431768211456").unwrap())),
        (
            "map",
            Value::Map(vec![
                (Value::from(1u64), Value::from("one")),
                (Value::from("k"), Value::Set(vec![Value::from(true), Value::Null])),
            ]),
        ),
        ("err", Value::Error(ErrorValue::new("TypeError", "bad"))),
        ("list", Value::Array(vec![Value::from(-4i64), Value::from("x")])),
    ]);

    let echoed = wallet.bridge().call("echo", value.clone(), false).await.unwrap();
    assert_eq!(echoed, value);
}

#[tokio::test]
async fn test_concurrent_calls_resolve_independently() {
    init_tracing();
    let wallet = EmbeddedWallet::connect(&echo_connector(), &options())
        .await
        .unwrap();

    let calls = (0..8u64).map(|i| {
        let wallet = wallet.clone();
        async move {
            let params = Value::object([
                ("delayMs", Value::from((8 - i) * 5)),
                ("index", Value::from(i)),
            ]);
            wallet.bridge().call("delayed", params, false).await
        }
    });
    let results = futures::future::join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        let result = result.unwrap();
        assert_eq!(result.get("index").and_then(Value::as_u64), Some(i as u64));
    }
    assert!(wallet.bridge().pending_nonces().is_empty());
}

#[tokio::test]
async fn test_remote_error_keeps_name_message_and_stack() {
    init_tracing();
    let wallet = EmbeddedWallet::connect(&echo_connector(), &options())
        .await
        .unwrap();

    match wallet.bridge().call("fail", Value::Null, false).await {
        Err(WalletError::Remote(err)) => {
            assert_eq!(err.name, "RangeError");
            assert_eq!(err.message, "out of range");
            assert_eq!(err.stack.as_deref(), Some("at fail (wallet.js:7:3)"));
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_erc3009_request_reaches_wallet_with_bigint_amount() {
    init_tracing();
    let connector = LocalConnector::new(|remote: LocalChannel, options: &EmbedOptions| {
        let responder = Responder::new(remote);
        responder.handle(METHOD_GET_ERC3009_SIGNATURE, |params: Value| async move {
            let Some(Value::BigInt(amount)) = params.get("amount").cloned() else {
                return Err(ErrorValue::new("TypeError", "amount must be a BigInt"));
            };
            let to = params
                .get("destinationAddress")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Value::object([
                ("from", Value::from("0x3333333333333333333333333333333333333333")),
                ("nonce", Value::from(format!("0x{}", "ab".repeat(32)))),
                ("signature", Value::from("0xsigned")),
                ("to", Value::from(to)),
                ("validAfter", params.get("validAfter").cloned().unwrap_or(Value::Null)),
                ("validBefore", params.get("validUntil").cloned().unwrap_or(Value::Null)),
                ("value", Value::BigInt(amount)),
            ]))
        });
        responder.announce(&options.name);
    });
    let wallet = EmbeddedWallet::connect(&connector, &options()).await.unwrap();

    let auth = wallet
        .get_erc3009_signature(&Erc3009Request {
            recipient: "https://api.example.com/report".to_string(),
            destination_address: PAY_TO,
            amount: U256::from(1_000_000u64),
            valid_until: 1_700_000_060,
            valid_after: 1_700_000_000,
        })
        .await
        .unwrap();

    assert_eq!(auth.signature, "0xsigned");
    assert_eq!(auth.value, "1000000");
    assert_eq!(auth.valid_after, "1700000000");
    assert_eq!(auth.valid_before, "1700000060");
    assert_eq!(auth.to.parse::<Address>().unwrap(), PAY_TO);
}
