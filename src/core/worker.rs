//! 后台 worker：串行消费前端命令，驱动 Orchestrator
//!
//! 同一会话上的回合严格串行：运行中收到的 Submit / AcceptOffer / Clear 排队，Cancel 立即取消当前回合。
//! 前端通过 reply_rx 取回合结果，通过 event_rx 展示「思考中」等过程事件。

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::actions::FollowUpOffer;
use crate::react::{LoopEvent, Orchestrator, TurnReply};

/// 从前端发往 worker 的命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交用户输入，触发一个回合
    Submit(String),
    /// 用户接受了某个后续动作提议
    AcceptOffer(FollowUpOffer),
    /// 取消当前回合
    Cancel,
    /// 清空对话历史
    Clear,
    Quit,
}

pub struct AgentHandle {
    pub cmd_tx: mpsc::UnboundedSender<Command>,
    pub reply_rx: mpsc::UnboundedReceiver<TurnReply>,
    pub event_rx: mpsc::UnboundedReceiver<LoopEvent>,
    pub task: JoinHandle<()>,
}

/// 在运行中的回合与命令通道之间 select；返回回合结果
async fn run_interruptible<F>(
    run: F,
    cancel: &CancellationToken,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut VecDeque<Command>,
) -> TurnReply
where
    F: Future<Output = TurnReply>,
{
    tokio::pin!(run);
    loop {
        tokio::select! {
            reply = &mut run => return reply,
            Some(cmd) = cmd_rx.recv() => match cmd {
                Command::Cancel => cancel.cancel(),
                Command::Quit => {
                    cancel.cancel();
                    pending.push_back(Command::Quit);
                }
                other => pending.push_back(other),
            },
        }
    }
}

pub fn spawn_worker(orchestrator: Orchestrator) -> AgentHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<TurnReply>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<LoopEvent>();
    let mut orchestrator = orchestrator.with_event_tx(event_tx);

    let task = tokio::spawn(async move {
        let mut pending: VecDeque<Command> = VecDeque::new();
        loop {
            let cmd = match pending.pop_front() {
                Some(cmd) => cmd,
                None => match cmd_rx.recv().await {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            match cmd {
                Command::Submit(input) => {
                    let cancel = CancellationToken::new();
                    let run = orchestrator.run_turn_with_cancel(&input, cancel.clone());
                    let reply = run_interruptible(run, &cancel, &mut cmd_rx, &mut pending).await;
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                Command::AcceptOffer(offer) => {
                    let cancel = CancellationToken::new();
                    let run = orchestrator.run_offer(&offer, cancel.clone());
                    let reply = run_interruptible(run, &cancel, &mut cmd_rx, &mut pending).await;
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                // 空闲时无可取消
                Command::Cancel => {}
                Command::Clear => orchestrator.clear(),
                Command::Quit => break,
            }
        }
        tracing::debug!("worker stopped");
    });

    AgentHandle {
        cmd_tx,
        reply_rx,
        event_rx,
        task,
    }
}
