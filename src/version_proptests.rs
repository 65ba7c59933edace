use super::*;
use proptest::prelude::*;

/// ドット区切りの数値バージョン
fn version_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..1000, 1..6)
}

fn join(parts: &[u32]) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

proptest! {
    /// 同じ文字列同士は常に等しい
    #[test]
    fn prop_reflexive(v in version_strategy()) {
        let s = join(&v);
        prop_assert_eq!(compare(&s, &s), 0);
    }

    /// 引数を入れ替えると符号が反転する
    #[test]
    fn prop_antisymmetric(a in version_strategy(), b in version_strategy()) {
        let (sa, sb) = (join(&a), join(&b));
        prop_assert_eq!(compare(&sa, &sb), -compare(&sb, &sa));
    }

    /// 末尾に .0 を足しても順序は変わらない
    #[test]
    fn prop_trailing_zero_padding(v in version_strategy(), zeros in 1usize..4) {
        let s = join(&v);
        let padded = format!("{}{}", s, ".0".repeat(zeros));
        prop_assert_eq!(compare(&s, &padded), 0);
    }

    /// 接頭辞 v を付けても数値比較の結果は同じ
    #[test]
    fn prop_prefix_is_ignored(a in version_strategy(), b in version_strategy()) {
        let (sa, sb) = (join(&a), join(&b));
        prop_assert_eq!(compare(&format!("v{}", sa), &sb), compare(&sa, &sb));
    }
}
