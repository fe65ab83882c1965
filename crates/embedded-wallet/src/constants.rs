//! Event names and defaults shared by the host and the embedded wallet.

/// Event the remote side answers every RPC request on.
pub const CALLBACK_EVENT: &str = "callback";

/// Event the remote side announces itself on once its handlers are mounted.
pub const HANDSHAKE_EVENT: &str = "__handshake";

/// Default name of the embedded wallet frame.
pub const DEFAULT_FRAME_NAME: &str = "embedded-wallet";

/// Default id of the element the wallet frame is mounted into.
pub const DEFAULT_CONTAINER: &str = "wallet-container";

// RPC method names exposed by the wallet.
pub const METHOD_GET_STATUS: &str = "getStatus";
pub const METHOD_SIGN_IN: &str = "signIn";
pub const METHOD_GET_ERC3009_SIGNATURE: &str = "getERC3009Signature";
pub const METHOD_GET_PERMIT_SIGNATURE: &str = "getPermitSignature";
pub const METHOD_SIGN_OUT: &str = "signOut";
pub const METHOD_GET_ACCOUNT_ADDRESS: &str = "getAccountAddress";
