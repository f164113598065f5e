//! HostEngine port - リモート実行エンジンの抽象化
//!
//! The engine owns the remote execution contexts. The relay only asks it to
//! launch programs and to poke running lambdas; everything that flows back
//! arrives as a [`HostEvent`](crate::domain::HostEvent).

use crate::domain::{
    CallbackId, EngineError, ExecutionContext, LambdaId, RemoteStatement, RemoteTarget,
};

/// HostEngine はリモート実行コンテキストへの入口
///
/// # 契約
/// - `run_script` と `is_resident` だけが同期的に結果を返す
/// - `run_script` は program に書かれた LambdaId（`next_lambda_id` で予約したもの）で起動する
/// - それ以外はすべて fire-and-forget（リモート側が処理する前に戻る）
/// - 未知の LambdaId に対する操作は黙って捨てる
///
/// # Thread Safety
/// - `Send + Sync` を要求（dispatch loop と caller の両方から使う）
pub trait HostEngine: Send + Sync {
    /// Reserve the id the next launched lambda will carry.
    fn next_lambda_id(&self) -> LambdaId;

    /// Whether the task behind `entry` stays resident after completing, as
    /// its definition declares.
    fn is_resident(&self, entry: &str) -> Result<bool, EngineError>;

    /// Launch a composed program under the lambda id it carries. `keep_alive` keeps the remote context (and
    /// its exports) after the program completes.
    fn run_script(
        &self,
        program: &str,
        context: ExecutionContext,
        keep_alive: bool,
    ) -> Result<LambdaId, EngineError>;

    /// Invoke `target` inside a lambda with serialized `args`. A non-`NONE`
    /// callback asks for a `Message` event carrying the reply.
    fn call_script_function(
        &self,
        lambda: LambdaId,
        target: RemoteTarget,
        args: &str,
        callback: CallbackId,
    );

    fn run_script_in_lambda(&self, lambda: LambdaId, statement: RemoteStatement);

    /// Terminate a lambda's remote context.
    fn stop_lambda(&self, lambda: LambdaId);
}
