//! バージョン比較
//!
//! ローカル版とマーケット版のバージョン文字列を比較する。
//! 厳密なドット区切り数値として解釈できない場合は、数字とドット以外を取り除いた
//! 寛容な解釈にフォールバックする。比較は失敗しない。

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

/// 厳密形式: `1`, `1.2`, `1.2.3.4` ...
static STRICT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("valid regex"));

/// 2つのバージョン文字列を比較する
///
/// - 空文字（未設定）は常に古いとみなす（`a` が空なら Less、`b` だけ空なら Greater）
/// - 両方が厳密形式ならその数値列を比較
/// - それ以外は数字とドット以外を除去し、各セグメントを整数化（失敗時は 0）して比較
/// - 不足する末尾セグメントは 0 で埋める
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() {
        return Ordering::Less;
    }
    if b.is_empty() {
        return Ordering::Greater;
    }

    match (parse_strict(a), parse_strict(b)) {
        (Some(left), Some(right)) => compare_segments(&left, &right),
        _ => compare_segments(&parse_lenient(a), &parse_lenient(b)),
    }
}

/// `compare_versions` を -1 / 0 / 1 で返す
pub fn compare(a: &str, b: &str) -> i32 {
    match compare_versions(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// ローカル版がリモート版より古いか
pub fn is_upgrade_available(local: &str, remote: &str) -> bool {
    compare_versions(local, remote) == Ordering::Less
}

fn parse_strict(version: &str) -> Option<Vec<u64>> {
    if !STRICT_VERSION.is_match(version) {
        return None;
    }
    version.split('.').map(|s| s.parse().ok()).collect()
}

fn parse_lenient(version: &str) -> Vec<u64> {
    let cleaned: String = version
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(0))
        .collect()
}

fn compare_segments(left: &[u64], right: &[u64]) -> Ordering {
    let len = left.len().max(right.len());
    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
#[path = "version_test.rs"]
mod tests;

#[cfg(test)]
#[path = "version_proptests.rs"]
mod proptests;
