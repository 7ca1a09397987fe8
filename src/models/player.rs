use crate::models::ship::PlayerCommand;

/// プレイヤー操作の入力スクリプト
///
/// 時刻つきのコマンド列を保持し、時刻に達したものから順に払い出します。
#[derive(Debug, Clone, Default)]
pub struct PlayerScript {
    commands: Vec<(f64, PlayerCommand)>,
    next_index: usize,
}

impl PlayerScript {
    /// コマンド列から作成（時刻順に並べ替える）
    pub fn new(mut commands: Vec<(f64, PlayerCommand)>) -> Self {
        commands.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            commands,
            next_index: 0,
        }
    }

    /// 現在時刻までに到達したコマンドのうち最新のものを返す
    ///
    /// 同じティック内に複数のコマンドが到達した場合は最後のものだけが有効です。
    pub fn poll(&mut self, current_time: f64) -> Option<PlayerCommand> {
        let mut latest = None;
        while let Some((time, command)) = self.commands.get(self.next_index) {
            if *time > current_time {
                break;
            }
            latest = Some(*command);
            self.next_index += 1;
        }
        latest
    }
}
