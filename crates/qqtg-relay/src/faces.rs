//! Names for QQ's built-in ("classic") face ids.

/// English tag for a classic face, or `None` when the id is not in the table.
pub fn face_name(id: i32) -> Option<&'static str> {
    let name = match id {
        0 => "surprised",
        1 => "pout",
        2 => "heart_eyes",
        3 => "daze",
        4 => "proud",
        5 => "tears",
        6 => "shy",
        7 => "zip_it",
        8 => "sleep",
        9 => "sob",
        10 => "awkward",
        11 => "angry",
        12 => "tongue",
        13 => "grin",
        14 => "smile",
        15 => "sad",
        16 => "cool",
        18 => "frantic",
        19 => "vomit",
        20 => "chuckle",
        21 => "cute",
        22 => "eye_roll",
        23 => "arrogant",
        24 => "hungry",
        25 => "drowsy",
        26 => "panic",
        27 => "sweat",
        28 => "laugh",
        29 => "relaxed",
        30 => "determined",
        31 => "scold",
        32 => "question",
        33 => "shush",
        34 => "dizzy",
        35 => "tormented",
        36 => "unlucky",
        37 => "skull",
        38 => "hammer",
        39 => "bye",
        41 => "shiver",
        42 => "love",
        43 => "jump",
        46 => "pig",
        49 => "hug",
        53 => "cake",
        54 => "lightning",
        55 => "bomb",
        56 => "knife",
        57 => "soccer",
        59 => "poop",
        60 => "coffee",
        61 => "rice",
        63 => "rose",
        64 => "wilted",
        66 => "heart",
        67 => "broken_heart",
        69 => "gift",
        74 => "sun",
        75 => "moon",
        76 => "thumbs_up",
        77 => "thumbs_down",
        78 => "handshake",
        79 => "victory",
        85 => "kiss",
        86 => "fuming",
        89 => "watermelon",
        96 => "cold_sweat",
        97 => "wipe_sweat",
        98 => "pick_nose",
        99 => "applause",
        100 => "embarrassed",
        101 => "smirk",
        102 => "humph_left",
        103 => "humph_right",
        104 => "yawn",
        105 => "contempt",
        106 => "wronged",
        107 => "about_to_cry",
        108 => "sly",
        109 => "peck",
        110 => "startled",
        111 => "pitiful",
        112 => "cleaver",
        113 => "beer",
        114 => "basketball",
        115 => "ping_pong",
        116 => "blow_kiss",
        117 => "ladybug",
        118 => "fist_salute",
        119 => "beckon",
        120 => "fist",
        121 => "pinky",
        122 => "love_you",
        123 => "no",
        124 => "ok",
        125 => "spin",
        129 => "wave",
        144 => "cheer",
        147 => "lollipop",
        171 => "tea",
        173 => "tears_of_joy_run",
        174 => "helpless",
        175 => "act_cute",
        176 => "conflicted",
        179 => "doge",
        180 => "delighted",
        181 => "poke",
        182 => "lol",
        183 => "gorgeous",
        201 => "like",
        203 => "chin_rest",
        212 => "thinking",
        214 => "smooch",
        219 => "nuzzle",
        222 => "hugs",
        227 => "clap",
        232 => "zen",
        240 => "spit",
        243 => "hair_flip",
        246 => "cheer_up",
        262 => "headache",
        264 => "facepalm",
        265 => "eyes_burning",
        266 => "whoa",
        267 => "balding",
        268 => "question_face",
        269 => "lurking",
        270 => "emm",
        271 => "popcorn",
        272 => "hehe",
        273 => "jealous",
        277 => "woof",
        278 => "sweat_drop",
        _ => return None,
    };
    Some(name)
}
